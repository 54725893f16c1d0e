use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait DailyJob: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> Result<()>;
}

struct FnJob<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> DailyJob for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<()> {
        (self.f)().await
    }
}

pub fn job_fn<F, Fut>(name: &str, f: F) -> Arc<dyn DailyJob>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnJob {
        name: name.to_string(),
        f,
    })
}
