//! Replay and disconnected sources
//!
//! [`ReplaySource`] feeds a scripted sequence of poll results, one per poll:
//! recorded sensor captures from a file, or hand-written scenarios in tests.
//! [`DisconnectedSource`] stands in when no hardware is configured.

use super::{LineSource, TransportFault};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;

/// One scripted poll result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayItem {
    /// A line is available
    Line(String),
    /// Nothing waiting on this poll
    Silence,
    /// The transport reports a fault
    Fault(String),
}

/// Scripted line source. Once the script is exhausted every poll returns no data.
pub struct ReplaySource {
    name: String,
    items: VecDeque<ReplayItem>,
    served: usize,
}

impl ReplaySource {
    pub fn new(name: impl Into<String>, items: impl IntoIterator<Item = ReplayItem>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().collect(),
            served: 0,
        }
    }

    /// Script that yields each line in turn.
    pub fn from_lines<I, T>(lines: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(
            "replay",
            lines.into_iter().map(|l| ReplayItem::Line(l.into())),
        )
    }

    /// Load a capture file. Each non-blank line becomes one poll result.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let items: Vec<ReplayItem> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| ReplayItem::Line(l.to_string()))
            .collect();

        tracing::info!(
            path = %path.display(),
            lines = items.len(),
            "Loaded replay capture"
        );
        Ok(Self::new(format!("replay:{}", path.display()), items))
    }

    pub fn is_exhausted(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of poll results handed out so far.
    pub fn served(&self) -> usize {
        self.served
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl LineSource for ReplaySource {
    async fn poll(&mut self) -> Result<Option<String>, TransportFault> {
        let Some(item) = self.items.pop_front() else {
            return Ok(None);
        };
        self.served += 1;
        match item {
            ReplayItem::Line(line) => {
                let line = line.trim();
                if line.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(line.to_string()))
                }
            }
            ReplayItem::Silence => Ok(None),
            ReplayItem::Fault(reason) => Err(TransportFault::ConnectionFailed(reason)),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Source with no hardware behind it. Every poll returns no data.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedSource;

#[async_trait]
impl LineSource for DisconnectedSource {
    async fn poll(&mut self) -> Result<Option<String>, TransportFault> {
        Ok(None)
    }

    fn source_name(&self) -> &str {
        "disconnected"
    }

    fn is_connected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_replay_yields_script_in_order() {
        let mut source = ReplaySource::new(
            "script",
            vec![
                ReplayItem::Line("Distance:10cm".to_string()),
                ReplayItem::Silence,
                ReplayItem::Fault("unplugged".to_string()),
                ReplayItem::Line("  Distance:11cm\r".to_string()),
            ],
        );

        assert_eq!(source.poll().await.unwrap(), Some("Distance:10cm".to_string()));
        assert_eq!(source.poll().await.unwrap(), None);
        assert!(matches!(
            source.poll().await,
            Err(TransportFault::ConnectionFailed(_))
        ));
        assert_eq!(source.poll().await.unwrap(), Some("Distance:11cm".to_string()));
        assert!(source.is_exhausted());
        assert_eq!(source.served(), 4);

        // Exhausted sources stay quiet
        assert_eq!(source.poll().await.unwrap(), None);
        assert_eq!(source.served(), 4);
    }

    #[tokio::test]
    async fn test_replay_from_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Distance:10cm").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "Distance:12cm\r").unwrap();

        let mut source = ReplaySource::from_file(file.path()).unwrap();
        assert_eq!(source.remaining(), 2);
        assert!(source.source_name().starts_with("replay:"));
        assert_eq!(source.poll().await.unwrap(), Some("Distance:10cm".to_string()));
        assert_eq!(source.poll().await.unwrap(), Some("Distance:12cm".to_string()));
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_replay_from_missing_file() {
        assert!(ReplaySource::from_file(Path::new("/nonexistent/capture.txt")).is_err());
    }

    #[tokio::test]
    async fn test_disconnected_source() {
        let mut source = DisconnectedSource;
        assert!(!source.is_connected());
        assert_eq!(source.source_name(), "disconnected");
        assert_eq!(source.poll().await.unwrap(), None);
    }
}
