use super::Interceptor;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writes one markdown transcript per model call into a directory.
#[derive(Debug)]
pub struct FileInterceptor {
    base_path: PathBuf,
}

impl FileInterceptor {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl Interceptor for FileInterceptor {
    async fn save(&self, prompt: &str, response: &str) -> std::io::Result<()> {
        let timestamp = Utc::now();
        let filename = format!("transcript_{}.md", timestamp.format("%Y%m%d_%H%M%S_%6f"));
        let file_path = self.base_path.join(filename);

        fs::create_dir_all(&self.base_path).await?;

        let content = format!(
            "# Prompt\n\n{}\n\n# Response\n\n{}\n\n---\nrecorded {}\n",
            prompt,
            response,
            timestamp.to_rfc3339()
        );

        let mut file = fs::File::create(&file_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %file_path.display(), "transcript saved");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_prompt_and_response() {
        let dir = std::env::temp_dir().join(format!("quiz-transcripts-{}", std::process::id()));
        let interceptor = FileInterceptor::new(&dir);
        interceptor.save("Fråga?", "{\"questions\":[]}").await.unwrap();

        let mut entries = fs::read_dir(&dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let body = fs::read_to_string(entry.path()).await.unwrap();
        assert!(body.starts_with("# Prompt\n\nFråga?"));
        assert!(body.contains("# Response"));

        let _ = fs::remove_dir_all(&dir).await;
    }
}
