//! Diagnostic test calls against the completion service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::{CompletionClient, HealthResponse, ModelsResponse, StatsResponse};
use crate::controller::ChatController;
use crate::error::Result;
use crate::notify::Toast;

/// Which auxiliary endpoint to test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnostic {
    Health,
    Models,
    Stats,
}

impl Diagnostic {
    pub const ALL: [Self; 3] = [Self::Health, Self::Models, Self::Stats];

    fn failure_message(self) -> &'static str {
        match self {
            Self::Health => "❌ Health check failed",
            Self::Models => "❌ Models test failed",
            Self::Stats => "❌ Stats test failed",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Health => "health",
            Self::Models => "models",
            Self::Stats => "stats",
        })
    }
}

impl FromStr for Diagnostic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "health" => Ok(Self::Health),
            "models" => Ok(Self::Models),
            "stats" => Ok(Self::Stats),
            other => Err(format!("unknown diagnostic: {other}")),
        }
    }
}

/// Successful result of a diagnostic call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Health(HealthResponse),
    Models(ModelsResponse),
    Stats(StatsResponse),
}

impl Outcome {
    /// One-line success summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Health(_) => "✅ Health check OK".to_string(),
            Self::Models(models) => format!("✅ Found {} model(s)", models.data.len()),
            Self::Stats(_) => "✅ Stats loaded".to_string(),
        }
    }
}

/// Call the endpoint behind `diagnostic`.
pub async fn check(diagnostic: Diagnostic, client: &CompletionClient) -> Result<Outcome> {
    Ok(match diagnostic {
        Diagnostic::Health => Outcome::Health(client.health().await?),
        Diagnostic::Models => Outcome::Models(client.models().await?),
        Diagnostic::Stats => Outcome::Stats(client.stats().await?),
    })
}

/// Run a diagnostic from the widget and report it as a toast.
///
/// A successful stats test also refreshes the sidebar.
pub async fn run(controller: &ChatController, diagnostic: Diagnostic) -> Toast {
    match check(diagnostic, controller.client()).await {
        Ok(outcome) => {
            tracing::info!(diagnostic = %diagnostic, outcome = ?outcome, "Diagnostic succeeded");
            let summary = outcome.summary();
            if let Outcome::Stats(stats) = outcome {
                controller.stats().apply(stats);
            }
            controller.notifier().success(summary)
        }
        Err(e) => {
            tracing::error!(diagnostic = %diagnostic, error = %e, "Diagnostic failed");
            controller.notifier().error(diagnostic.failure_message())
        }
    }
}
