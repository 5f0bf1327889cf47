use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{chat_title_from, Chat, Message, Sender, User};

// Define the database schema using CREATE TABLE IF NOT EXISTS statements
const MIGRATIONS_SQL: &str = "
-- User profiles mirrored from the auth provider
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL, -- UUID issued by the auth provider
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL -- Unix Timestamp (milliseconds)
);

-- Chats Table
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY NOT NULL, -- UUID
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id);

-- Messages Table
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY NOT NULL, -- UUID
    chat_id TEXT NOT NULL,
    sender TEXT NOT NULL, -- 'user' or 'ai'
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id);
";

#[derive(Debug, Clone)]
pub struct StorageManager {
    pool: SqlitePool,
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, anyhow::Error> {
    DateTime::from_timestamp_millis(ms).context("Invalid timestamp")
}

fn chat_from_row(row: &SqliteRow) -> Result<Chat, anyhow::Error> {
    let id: String = row.try_get("id")?;
    Ok(Chat {
        id: Uuid::parse_str(&id).context("Failed to parse chat ID")?,
        title: row.try_get("title")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message, anyhow::Error> {
    let id: String = row.try_get("id")?;
    let sender: String = row.try_get("sender")?;
    Ok(Message {
        id: Uuid::parse_str(&id).context("Failed to parse message ID")?,
        sender: Sender::parse(&sender)
            .with_context(|| format!("Unknown message sender '{}'", sender))?,
        content: row.try_get("content")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

impl StorageManager {
    /// Connects to the database at `database_url` and runs migrations.
    ///
    /// In-memory URLs are pinned to a single connection that never expires,
    /// otherwise every pooled connection would see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self, anyhow::Error> {
        log::info!("Connecting to database: {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies the database schema migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database migrations completed.");
        Ok(())
    }

    /// Writes (or refreshes) the profile row for a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        log::debug!("Upserting profile for user {}", user.id);
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET email = excluded.email, name = excluded.name
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await
        .context("Failed to upsert user profile")?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, anyhow::Error> {
        let row = sqlx::query("SELECT id, email, name FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user profile")?;

        row.map(|r| -> Result<User, anyhow::Error> {
            let id: String = r.try_get("id")?;
            Ok(User {
                id: Uuid::parse_str(&id).context("Failed to parse user ID")?,
                email: r.try_get("email")?,
                name: r.try_get("name")?,
            })
        })
        .transpose()
    }

    /// Creates a chat owned by `user_id`, titled from the user's first input.
    pub async fn create_chat(&self, user_id: Uuid, first_input: &str) -> Result<Chat, anyhow::Error> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            title: chat_title_from(first_input),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO chats (id, user_id, title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(chat.id.to_string())
        .bind(user_id.to_string())
        .bind(&chat.title)
        .bind(to_millis(chat.created_at))
        .bind(to_millis(chat.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to insert new chat into database")?;

        log::info!("Created chat {} for user {}", chat.id, user_id);
        Ok(chat)
    }

    /// Fetches a single chat, only if it belongs to `user_id`.
    pub async fn get_chat(&self, user_id: Uuid, chat_id: Uuid) -> Result<Option<Chat>, anyhow::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, title, created_at, updated_at
            FROM chats
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(chat_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch chat from database")?;

        row.as_ref().map(chat_from_row).transpose()
    }

    /// Fetches all of a user's chats, most recently updated first.
    pub async fn list_chats(&self, user_id: Uuid) -> Result<Vec<Chat>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, created_at, updated_at
            FROM chats
            WHERE user_id = ?
            ORDER BY updated_at DESC, rowid DESC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chats from database")?;

        let chats = rows
            .iter()
            .map(chat_from_row)
            .collect::<Result<Vec<Chat>, anyhow::Error>>()?;
        log::debug!("Fetched {} chats for user {}", chats.len(), user_id);
        Ok(chats)
    }

    /// Deletes a chat and, through the cascade, its messages.
    /// Returns false when the chat does not exist or belongs to someone else.
    pub async fn delete_chat(&self, user_id: Uuid, chat_id: Uuid) -> Result<bool, anyhow::Error> {
        log::warn!("Deleting chat {} for user {}", chat_id, user_id);
        let result = sqlx::query("DELETE FROM chats WHERE id = ? AND user_id = ?")
            .bind(chat_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete chat from database")?;

        if result.rows_affected() == 0 {
            log::warn!("Attempted to delete non-existent chat: {}", chat_id);
            return Ok(false);
        }
        Ok(true)
    }

    /// Appends a message and moves the chat's `updated_at` to the message time.
    pub async fn save_message(&self, chat_id: Uuid, message: &Message) -> Result<(), anyhow::Error> {
        log::debug!("Saving message {} to chat {}", message.id, chat_id);
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, sender, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(chat_id.to_string())
        .bind(message.sender.as_str())
        .bind(&message.content)
        .bind(to_millis(message.created_at))
        .execute(&mut *tx)
        .await
        .context("Failed to insert message into database")?;

        sqlx::query("UPDATE chats SET updated_at = MAX(updated_at, ?) WHERE id = ?")
            .bind(to_millis(message.created_at))
            .bind(chat_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to update chat updated_at timestamp")?;

        tx.commit().await.context("Failed to commit message")?;
        Ok(())
    }

    /// Fetches all messages of a chat in creation order.
    pub async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, anyhow::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender, content, created_at
            FROM messages
            WHERE chat_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(chat_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch messages from database")?;

        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<Message>, anyhow::Error>>()?;
        log::debug!("Fetched {} messages for chat {}", messages.len(), chat_id);
        Ok(messages)
    }

    /// Stores the PM-KISAN example conversation for a user.
    pub async fn seed_example_chat(&self, user_id: Uuid) -> Result<Chat, anyhow::Error> {
        let messages = crate::seed::example_conversation();
        let chat = self.create_chat(user_id, crate::seed::EXAMPLE_QUESTION).await?;
        for message in &messages {
            self.save_message(chat.id, message).await?;
        }
        log::info!("Seeded example chat {} for user {}", chat.id, user_id);
        Ok(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn storage_with_user() -> (StorageManager, User) {
        let storage = StorageManager::connect("sqlite::memory:").await.unwrap();
        let user = User {
            id: Uuid::new_v4(),
            email: "asha@example.in".to_string(),
            name: "Asha".to_string(),
        };
        storage.upsert_user(&user).await.unwrap();
        (storage, user)
    }

    #[tokio::test]
    async fn messages_come_back_in_creation_order() {
        let (storage, user) = storage_with_user().await;
        let chat = storage.create_chat(user.id, "ration card").await.unwrap();

        let first = Message::new(Sender::User, "How do I apply for a ration card?");
        let mut second = Message::new(Sender::Ai, "# Ration Card");
        second.created_at = first.created_at;
        storage.save_message(chat.id, &first).await.unwrap();
        storage.save_message(chat.id, &second).await.unwrap();

        let messages = storage.list_messages(chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, first.id);
        assert_eq!(messages[1].sender, Sender::Ai);
    }

    #[tokio::test]
    async fn saving_a_message_moves_chat_to_top() {
        let (storage, user) = storage_with_user().await;
        let older = storage.create_chat(user.id, "older").await.unwrap();
        let newer = storage.create_chat(user.id, "newer").await.unwrap();

        let mut msg = Message::new(Sender::User, "bump");
        msg.created_at = Utc::now() + Duration::seconds(5);
        storage.save_message(older.id, &msg).await.unwrap();

        let chats = storage.list_chats(user.id).await.unwrap();
        assert_eq!(chats[0].id, older.id);
        assert_eq!(chats[1].id, newer.id);
        assert_eq!(chats[0].updated_at.timestamp_millis(), msg.created_at.timestamp_millis());
    }

    #[tokio::test]
    async fn chats_are_scoped_to_their_owner() {
        let (storage, user) = storage_with_user().await;
        let other = User {
            id: Uuid::new_v4(),
            email: "ravi@example.in".to_string(),
            name: "Ravi".to_string(),
        };
        storage.upsert_user(&other).await.unwrap();
        let chat = storage.create_chat(user.id, "mine").await.unwrap();

        assert!(storage.get_chat(other.id, chat.id).await.unwrap().is_none());
        assert!(storage.list_chats(other.id).await.unwrap().is_empty());
        assert!(!storage.delete_chat(other.id, chat.id).await.unwrap());
        assert!(storage.get_chat(user.id, chat.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_a_chat_removes_its_messages() {
        let (storage, user) = storage_with_user().await;
        let chat = storage.seed_example_chat(user.id).await.unwrap();
        assert_eq!(storage.list_messages(chat.id).await.unwrap().len(), 2);

        assert!(storage.delete_chat(user.id, chat.id).await.unwrap());
        assert!(storage.list_messages(chat.id).await.unwrap().is_empty());
        assert!(storage.list_chats(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_user_refreshes_profile() {
        let (storage, mut user) = storage_with_user().await;
        user.name = "Asha Devi".to_string();
        storage.upsert_user(&user).await.unwrap();
        let stored = storage.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Asha Devi");
    }
}
