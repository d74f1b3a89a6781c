//! Persisted directory of chats the bot has been added to.
//!
//! The Bot API has no "list my dialogs" call, so the destination listing is
//! built from `my_chat_member` updates and kept across restarts as a small
//! JSON file.

use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use gramcast_core::domain::{ChatId, Destination};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChatRecord {
    id: i64,
    title: String,
    is_group: bool,
}

pub struct ChatDirectory {
    path: PathBuf,
    chats: Mutex<HashMap<i64, ChatRecord>>,
}

impl ChatDirectory {
    /// Loads the directory, starting empty if the file is absent or
    /// unparseable (the listing rebuilds itself from future updates).
    pub fn load(path: PathBuf) -> Self {
        let chats = match std::fs::read_to_string(&path) {
            Ok(txt) => match serde_json::from_str::<Vec<ChatRecord>>(&txt) {
                Ok(records) => records.into_iter().map(|r| (r.id, r)).collect(),
                Err(e) => {
                    eprintln!("[CHATS] malformed directory {}: {e}", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            chats: Mutex::new(chats),
        }
    }

    pub async fn record(&self, id: i64, title: String, is_group: bool) {
        let mut chats = self.chats.lock().await;
        chats.insert(
            id,
            ChatRecord {
                id,
                title,
                is_group,
            },
        );
        self.save(&chats);
    }

    pub async fn remove(&self, id: i64) {
        let mut chats = self.chats.lock().await;
        if chats.remove(&id).is_some() {
            self.save(&chats);
        }
    }

    pub async fn list(&self) -> Vec<Destination> {
        let chats = self.chats.lock().await;
        let mut out: Vec<Destination> = chats
            .values()
            .map(|r| Destination {
                chat_id: ChatId(r.id),
                is_group: r.is_group,
                title: r.title.clone(),
            })
            .collect();
        out.sort_by_key(|d| d.chat_id.0);
        out
    }

    fn save(&self, chats: &HashMap<i64, ChatRecord>) {
        let mut records: Vec<&ChatRecord> = chats.values().collect();
        records.sort_by_key(|r| r.id);
        match serde_json::to_string(&records) {
            Ok(txt) => {
                if let Err(e) = std::fs::write(&self.path, txt) {
                    eprintln!("[CHATS] failed to persist {}: {e}", self.path.display());
                }
            }
            Err(e) => eprintln!("[CHATS] failed to serialize directory: {e}"),
        }
    }
}
