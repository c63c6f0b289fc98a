//! Interaction utilisateur: confirmation de projection et choix du commit

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use crate::commit::CommitChoice;
use crate::projection::ProjectionStatus;

/// Questions posées pendant un run
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Continuer malgré une projection non vérifiée ?
    async fn confirm_projection(&self, status: &ProjectionStatus) -> Result<bool>;

    /// Que faire des `accepted` sketches prêts à être écrits ?
    async fn choose_commit(&self, accepted: usize) -> Result<CommitChoice>;
}

/// Réponses fixées à l'avance (mode non interactif)
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompter {
    pub accept_projection: bool,
    pub choice: CommitChoice,
}

impl FixedPrompter {
    pub fn new(accept_projection: bool, choice: CommitChoice) -> Self {
        Self {
            accept_projection,
            choice,
        }
    }
}

#[async_trait]
impl Prompter for FixedPrompter {
    async fn confirm_projection(&self, _status: &ProjectionStatus) -> Result<bool> {
        Ok(self.accept_projection)
    }

    async fn choose_commit(&self, _accepted: usize) -> Result<CommitChoice> {
        Ok(self.choice)
    }
}

/// Questions posées ligne par ligne sur un flux texte
pub struct LinePrompter<R, W> {
    io: Mutex<(R, W)>,
}

/// Prompter sur stdin/stdout
pub type TerminalPrompter = LinePrompter<BufReader<Stdin>, Stdout>;

impl TerminalPrompter {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LinePrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    /// Pose une question; `None` en fin de flux
    async fn ask(&self, question: &str) -> Result<Option<String>> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;

        writer
            .write_all(question.as_bytes())
            .await
            .context("Failed to write prompt")?;
        writer.flush().await.context("Failed to flush prompt")?;

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_ascii_lowercase()))
    }

    /// Accès aux flux (tests)
    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }
}

#[async_trait]
impl<R, W> Prompter for LinePrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm_projection(&self, status: &ProjectionStatus) -> Result<bool> {
        let question = format!(
            "Projection is {} (expected EPSG:4326). Continue anyway? [y/N] ",
            status
        );
        let answer = self.ask(&question).await?;
        Ok(matches!(answer.as_deref(), Some("y" | "yes")))
    }

    async fn choose_commit(&self, accepted: usize) -> Result<CommitChoice> {
        let question = format!(
            "{} sketches ready. Upload [s]ample, [a]ll or [c]ancel? ",
            accepted
        );
        loop {
            match self.ask(&question).await?.as_deref() {
                None | Some("" | "c" | "cancel") => return Ok(CommitChoice::Cancel),
                Some("s" | "sample") => return Ok(CommitChoice::Sample),
                Some("a" | "all") => return Ok(CommitChoice::All),
                Some(_) => continue,
            }
        }
    }
}
