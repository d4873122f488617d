use std::{fmt, path::PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::AsyncReadExt;

use crate::{executor::PrState, types::BotInput};

/// Where a JSON document is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Stdin,
    Path(PathBuf),
}

impl Location {
    /// `-` means standard input, anything else is a file path.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Location::Stdin
        } else {
            Location::Path(PathBuf::from(arg))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Stdin => write!(f, "<stdin>"),
            Location::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Supplies snapshots and current PR state to the engine.
#[async_trait]
pub trait SnapshotSource {
    async fn snapshot(&self, location: &Location) -> Result<BotInput>;

    async fn pr_state(&self, location: &Location) -> Result<PrState>;
}

/// Reads JSON documents from files or standard input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    async fn read_to_string(location: &Location) -> Result<String> {
        match location {
            Location::Stdin => {
                let mut text = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut text)
                    .await
                    .context("Failed to read standard input")?;
                Ok(text)
            }
            Location::Path(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read '{}'", path.display())),
        }
    }

    async fn read_json<T: DeserializeOwned>(location: &Location) -> Result<T> {
        let text = Self::read_to_string(location).await?;
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {location}"))
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn snapshot(&self, location: &Location) -> Result<BotInput> {
        Self::read_json(location).await
    }

    async fn pr_state(&self, location: &Location) -> Result<PrState> {
        Self::read_json(location).await
    }
}
