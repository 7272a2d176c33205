//! Yes/no prompts the supervisor must await before proceeding.

use futures::future::{self, BoxFuture, FutureExt};

pub trait Confirmer: Send + Sync {
    fn ask_yes_no(&self, message: &str) -> BoxFuture<'static, bool>;
}

/// Answers every prompt with a fixed value (headless `ACCEPT_EULA`).
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn ask_yes_no(&self, message: &str) -> BoxFuture<'static, bool> {
        tracing::info!("Prompt '{}' answered {}", message, if self.0 { "yes" } else { "no" });
        future::ready(self.0).boxed()
    }
}
