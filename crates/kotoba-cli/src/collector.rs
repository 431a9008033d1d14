use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use kotoba_core::{Answer, AnswerCollector, UserId, VocabularyItem};

/// Reads one answer per line, prompting on stdout. End of input or a read
/// error yields no answer, never a timeout.
pub struct LineCollector<R> {
    lines: Mutex<Lines<R>>,
}

impl LineCollector<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> LineCollector<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }
}

#[async_trait]
impl<R> AnswerCollector for LineCollector<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn await_answer(
        &self,
        user_id: UserId,
        item: &VocabularyItem,
        timeout: Duration,
    ) -> Option<Answer> {
        print!("{}  ({}s) > ", item.native_form, timeout.as_secs());
        let _ = std::io::stdout().flush();

        let mut lines = self.lines.lock().await;
        match tokio::time::timeout(timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => Some(Answer::Response(line)),
            Ok(Ok(None)) => {
                println!();
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(user_id, error = %e, "failed to read answer");
                None
            }
            Err(_) => Some(Answer::Timeout),
        }
    }
}
