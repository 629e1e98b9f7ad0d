//! Forget the stored identity.

use anyhow::Result;
use std::path::Path;

use crate::config::SessionRecord;

/// Run the logout command.
pub async fn run(data_dir: &Path) -> Result<()> {
    if SessionRecord::clear(data_dir).await? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::Identity;
    use tempfile::tempdir;

    #[tokio::test]
    async fn logout_removes_session() {
        let dir = tempdir().unwrap();
        SessionRecord::save(dir.path(), &Identity::new("1", "alice"))
            .await
            .unwrap();

        run(dir.path()).await.unwrap();

        assert!(SessionRecord::load(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_when_logged_out_succeeds() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path()).await.is_ok());
    }
}
