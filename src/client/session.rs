//! Chat-session manager.
//!
//! Holds what a chat screen shows and drives the request/refetch cycle. Local
//! messages are provisional: after every successful send the chat list and
//! the active chat's messages are refetched and the server's records replace
//! whatever was shown optimistically. Failures never retry; each one becomes
//! a single AI-authored message in the conversation.

use std::collections::HashMap;
use uuid::Uuid;

use crate::client::api::{ChatApi, ClientError};
use crate::client::upload::{ImageUpload, UploadError};
use crate::language::DEFAULT_LANGUAGE;
use crate::models::{Chat, Message, QueryRequest, Sender};

#[derive(Clone, Debug, PartialEq)]
pub struct ChatThread {
    pub chat: Chat,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// Nothing to send, or a request was already in flight.
    Ignored,
    Sent { chat_id: Uuid },
    Failed(ClientError),
}

pub struct ChatSession<A: ChatApi> {
    api: A,
    chats: Vec<ChatThread>,
    active_chat: Option<Uuid>,
    input_value: String,
    selected_image: Option<ImageUpload>,
    is_loading: bool,
    language: String,
    // Messages shown while no chat exists yet.
    draft: Vec<Message>,
}

impl<A: ChatApi> ChatSession<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            chats: Vec::new(),
            active_chat: None,
            input_value: String::new(),
            selected_image: None,
            is_loading: false,
            language: DEFAULT_LANGUAGE.to_string(),
            draft: Vec::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn chats(&self) -> &[ChatThread] {
        &self.chats
    }

    pub fn active_chat(&self) -> Option<Uuid> {
        self.active_chat
    }

    pub fn input_value(&self) -> &str {
        &self.input_value
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input_value = value.into();
    }

    pub fn selected_image(&self) -> Option<&ImageUpload> {
        self.selected_image.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, code: impl Into<String>) {
        self.language = code.into();
    }

    fn thread(&self, chat_id: Uuid) -> Option<&ChatThread> {
        self.chats.iter().find(|t| t.chat.id == chat_id)
    }

    fn thread_mut(&mut self, chat_id: Uuid) -> Option<&mut ChatThread> {
        self.chats.iter_mut().find(|t| t.chat.id == chat_id)
    }

    /// Messages of the active chat, or the draft in new-chat mode.
    pub fn visible_messages(&self) -> &[Message] {
        match self.active_chat.and_then(|id| self.thread(id)) {
            Some(thread) => &thread.messages,
            None => &self.draft,
        }
    }

    fn push_local(&mut self, message: Message) {
        match self.active_chat {
            Some(id) if self.thread(id).is_some() => {
                if let Some(thread) = self.thread_mut(id) {
                    thread.messages.push(message);
                }
            }
            _ => self.draft.push(message),
        }
    }

    fn push_error(&mut self, error: &ClientError) {
        self.push_local(Message::new(Sender::Ai, error.user_message()));
    }

    /// Replaces the chat list with the server's. Picks the most recent chat
    /// when none is active; an empty list leaves the session in new-chat mode.
    pub async fn fetch_chats(&mut self) -> Result<(), ClientError> {
        let server_chats = self.api.list_chats().await?;

        let mut loaded: HashMap<Uuid, Vec<Message>> = self
            .chats
            .drain(..)
            .map(|thread| (thread.chat.id, thread.messages))
            .collect();
        self.chats = server_chats
            .into_iter()
            .map(|chat| {
                let messages = loaded.remove(&chat.id).unwrap_or_default();
                ChatThread { chat, messages }
            })
            .collect();

        let active_known = self.active_chat.map_or(false, |id| self.thread(id).is_some());
        if !active_known {
            match self.chats.first().map(|t| t.chat.id) {
                Some(most_recent) => self.select_chat(most_recent).await?,
                None => self.active_chat = None,
            }
        }
        Ok(())
    }

    /// Replaces one chat's messages with the server's.
    pub async fn fetch_messages(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        let messages = self.api.list_messages(chat_id).await?;
        match self.thread_mut(chat_id) {
            Some(thread) => thread.messages = messages,
            None => log::debug!("Fetched messages for unknown chat {}", chat_id),
        }
        Ok(())
    }

    pub async fn select_chat(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        self.active_chat = Some(chat_id);
        self.draft.clear();
        self.fetch_messages(chat_id).await
    }

    /// Validates and stages an image for the next send. Nothing is uploaded
    /// until `send_message`.
    pub fn select_image(&mut self, image: ImageUpload) -> Result<(), UploadError> {
        image.validate()?;
        self.selected_image = Some(image);
        Ok(())
    }

    pub fn clear_image(&mut self) {
        self.selected_image = None;
    }

    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        let text = text.trim().to_string();
        if self.is_loading || (text.is_empty() && self.selected_image.is_none()) {
            return SendOutcome::Ignored;
        }

        let image = self.selected_image.take();
        let shown = match &image {
            Some(img) if text.is_empty() => format!("Uploaded document: {}", img.file_name),
            _ => text.clone(),
        };
        self.push_local(Message::new(Sender::User, shown));
        self.input_value.clear();
        self.is_loading = true;

        let result = match &image {
            Some(img) => self
                .api
                .post_ocr(
                    img,
                    Some(text.as_str()).filter(|t| !t.is_empty()),
                    &self.language,
                    self.active_chat,
                )
                .await
                .map(|r| r.chat_id),
            None => {
                let request = QueryRequest {
                    question: text,
                    language: self.language.clone(),
                    chat_id: self.active_chat,
                };
                self.api.post_query(&request).await.map(|r| r.chat_id)
            }
        };

        let outcome = match result {
            Ok(chat_id) => {
                self.active_chat = Some(chat_id);
                match self.reconcile(chat_id).await {
                    Ok(()) => {
                        self.draft.clear();
                        SendOutcome::Sent { chat_id }
                    }
                    Err(e) => {
                        self.push_error(&e);
                        SendOutcome::Failed(e)
                    }
                }
            }
            Err(e) => {
                log::warn!("Send failed: {}", e);
                self.push_error(&e);
                SendOutcome::Failed(e)
            }
        };

        self.is_loading = false;
        outcome
    }

    // The list comes first so a chat created by this send exists locally
    // before its messages land.
    async fn reconcile(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        self.fetch_chats().await?;
        self.fetch_messages(chat_id).await
    }

    /// Enters new-chat mode; the chat itself is created by the next send.
    pub fn new_chat(&mut self) {
        self.active_chat = None;
        self.input_value.clear();
        self.selected_image = None;
        self.draft.clear();
    }

    pub async fn delete_chat(&mut self, chat_id: Uuid) -> Result<(), ClientError> {
        if let Err(e) = self.api.delete_chat(chat_id).await {
            self.push_error(&e);
            return Err(e);
        }
        self.chats.retain(|t| t.chat.id != chat_id);
        if self.active_chat == Some(chat_id) {
            self.new_chat();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::render::render_conversation;
    use crate::models::{OcrResponse, QueryResponse};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Backend {
        chats: Vec<(Chat, Vec<Message>)>,
        calls: Vec<&'static str>,
        fail_with: Option<ClientError>,
    }

    #[derive(Default)]
    struct MockApi {
        backend: Mutex<Backend>,
    }

    impl MockApi {
        fn with_chats(count: usize, messages_each: usize) -> Self {
            let api = MockApi::default();
            {
                let mut backend = api.backend.lock().unwrap();
                for i in 0..count {
                    let at = Utc::now() - Duration::minutes(i as i64);
                    let chat = Chat {
                        id: Uuid::new_v4(),
                        title: format!("chat {}", i),
                        created_at: at,
                        updated_at: at,
                    };
                    let messages = (0..messages_each)
                        .map(|n| Message::new(if n % 2 == 0 { Sender::User } else { Sender::Ai }, format!("m{}", n)))
                        .collect();
                    backend.chats.push((chat, messages));
                }
            }
            api
        }

        fn fail_next(&self, error: ClientError) {
            self.backend.lock().unwrap().fail_with = Some(error);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.backend.lock().unwrap().calls.clone()
        }

        fn chat_count(&self) -> usize {
            self.backend.lock().unwrap().chats.len()
        }

        fn record(&self, call: &'static str) -> Result<(), ClientError> {
            let mut backend = self.backend.lock().unwrap();
            backend.calls.push(call);
            match backend.fail_with.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn answer(&self, chat_id: Option<Uuid>, user_text: &str, reply: &str) -> Result<Uuid, ClientError> {
            let mut backend = self.backend.lock().unwrap();
            let id = match chat_id {
                Some(id) => id,
                None => {
                    let now = Utc::now();
                    let chat = Chat { id: Uuid::new_v4(), title: user_text.to_string(), created_at: now, updated_at: now };
                    let id = chat.id;
                    backend.chats.insert(0, (chat, Vec::new()));
                    id
                }
            };
            let (_, messages) = backend
                .chats
                .iter_mut()
                .find(|(c, _)| c.id == id)
                .ok_or(ClientError::NotFound)?;
            messages.push(Message::new(Sender::User, user_text));
            messages.push(Message::new(Sender::Ai, reply));
            Ok(id)
        }
    }

    #[async_trait]
    impl ChatApi for MockApi {
        async fn list_chats(&self) -> Result<Vec<Chat>, ClientError> {
            self.record("list_chats")?;
            Ok(self.backend.lock().unwrap().chats.iter().map(|(c, _)| c.clone()).collect())
        }

        async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, ClientError> {
            self.record("list_messages")?;
            let backend = self.backend.lock().unwrap();
            backend
                .chats
                .iter()
                .find(|(c, _)| c.id == chat_id)
                .map(|(_, m)| m.clone())
                .ok_or(ClientError::NotFound)
        }

        async fn post_query(&self, request: &QueryRequest) -> Result<QueryResponse, ClientError> {
            self.record("post_query")?;
            let chat_id = self.answer(request.chat_id, &request.question, "# Answer")?;
            Ok(QueryResponse { answer: "# Answer".into(), chat_id, language: request.language.clone() })
        }

        async fn post_ocr(
            &self,
            image: &ImageUpload,
            question: Option<&str>,
            _language: &str,
            chat_id: Option<Uuid>,
        ) -> Result<OcrResponse, ClientError> {
            self.record("post_ocr")?;
            let shown = match question {
                Some(q) => q.to_string(),
                None => format!("Uploaded document: {}", image.file_name),
            };
            let chat_id = self.answer(chat_id, &shown, "# Notice explained")?;
            Ok(OcrResponse { ai_explanation: "# Notice explained".into(), chat_id, extracted_text: "NOTICE".into() })
        }

        async fn delete_chat(&self, chat_id: Uuid) -> Result<(), ClientError> {
            self.record("delete_chat")?;
            let mut backend = self.backend.lock().unwrap();
            let before = backend.chats.len();
            backend.chats.retain(|(c, _)| c.id != chat_id);
            if backend.chats.len() == before {
                return Err(ClientError::NotFound);
            }
            Ok(())
        }
    }

    fn png(name: &str) -> ImageUpload {
        ImageUpload::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    #[tokio::test]
    async fn empty_chat_list_means_new_chat_mode() {
        let mut session = ChatSession::new(MockApi::default());
        session.fetch_chats().await.unwrap();
        assert!(session.chats().is_empty());
        assert_eq!(session.active_chat(), None);
        assert!(session.visible_messages().is_empty());
    }

    #[tokio::test]
    async fn fetch_chats_selects_most_recent_and_loads_it() {
        let mut session = ChatSession::new(MockApi::with_chats(3, 4));
        session.fetch_chats().await.unwrap();
        let newest = session.chats()[0].chat.id;
        assert_eq!(session.active_chat(), Some(newest));
        assert_eq!(session.visible_messages().len(), 4);
    }

    #[tokio::test]
    async fn fetched_messages_render_one_bubble_each_in_order() {
        let mut session = ChatSession::new(MockApi::with_chats(1, 7));
        session.fetch_chats().await.unwrap();
        let bubbles = render_conversation(session.visible_messages());
        assert_eq!(bubbles.len(), 7);
        let ids: Vec<Uuid> = session.visible_messages().iter().map(|m| m.id).collect();
        assert_eq!(bubbles.iter().map(|b| b.message_id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn first_send_creates_exactly_one_chat_and_adopts_server_records() {
        let mut session = ChatSession::new(MockApi::default());
        session.set_input("What is PM-KISAN?");
        let input = session.input_value().to_string();

        let chat_id = match session.send_message(&input).await {
            SendOutcome::Sent { chat_id } => chat_id,
            other => panic!("expected a successful send, got {:?}", other),
        };

        assert_eq!(session.api().chat_count(), 1);
        assert_eq!(session.chats().len(), 1);
        assert_eq!(session.active_chat(), Some(chat_id));
        assert_eq!(session.input_value(), "");
        assert!(!session.is_loading());

        let server_messages = session.api().list_messages(chat_id).await.unwrap();
        assert_eq!(session.visible_messages(), server_messages.as_slice());
    }

    #[tokio::test]
    async fn follow_up_reuses_the_active_chat() {
        let mut session = ChatSession::new(MockApi::default());
        session.send_message("first").await;
        session.send_message("second").await;
        assert_eq!(session.api().chat_count(), 1);
        assert_eq!(session.visible_messages().len(), 4);
    }

    #[tokio::test]
    async fn failed_query_keeps_user_message_and_adds_one_error() {
        let api = MockApi::with_chats(1, 2);
        let mut session = ChatSession::new(api);
        session.fetch_chats().await.unwrap();

        session.api().fail_next(ClientError::Upstream);
        let outcome = session.send_message("Is my land record valid?").await;
        assert_eq!(outcome, SendOutcome::Failed(ClientError::Upstream));

        let visible = session.visible_messages();
        assert_eq!(visible.len(), 4);
        assert_eq!(visible[2].sender, Sender::User);
        assert_eq!(visible[2].content, "Is my land record valid?");
        assert_eq!(visible[3].sender, Sender::Ai);
        assert_eq!(visible[3].content, ClientError::Upstream.user_message());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn failure_in_new_chat_mode_lands_in_the_draft() {
        let api = MockApi::default();
        api.fail_next(ClientError::SessionExpired);
        let mut session = ChatSession::new(api);

        session.send_message("hello").await;
        assert_eq!(session.active_chat(), None);
        let visible = session.visible_messages();
        assert_eq!(visible.len(), 2);
        assert!(visible[1].content.contains("session has expired"));
        assert_eq!(session.api().chat_count(), 0);
    }

    #[tokio::test]
    async fn empty_sends_are_ignored_without_network() {
        let mut session = ChatSession::new(MockApi::default());
        assert_eq!(session.send_message("   ").await, SendOutcome::Ignored);
        assert!(session.api().calls().is_empty());
        assert!(session.visible_messages().is_empty());
    }

    #[tokio::test]
    async fn non_images_are_rejected_before_any_request() {
        let mut session = ChatSession::new(MockApi::default());
        let pdf = ImageUpload::new("notice.pdf", "application/pdf", vec![1, 2, 3]);
        assert!(matches!(session.select_image(pdf), Err(UploadError::NotAnImage(_))));
        assert!(session.selected_image().is_none());
        assert_eq!(session.send_message("").await, SendOutcome::Ignored);
        assert!(session.api().calls().is_empty());
    }

    #[tokio::test]
    async fn images_go_to_the_ocr_endpoint() {
        let mut session = ChatSession::new(MockApi::default());
        session.select_image(png("notice.png")).unwrap();

        let outcome = session.send_message("").await;
        assert!(matches!(outcome, SendOutcome::Sent { .. }));
        assert_eq!(session.api().calls()[0], "post_ocr");
        assert!(session.selected_image().is_none());
        assert_eq!(session.visible_messages()[0].content, "Uploaded document: notice.png");
    }

    #[tokio::test]
    async fn a_note_typed_with_an_image_is_sent_with_it() {
        let mut session = ChatSession::new(MockApi::default());
        session.select_image(png("notice.png")).unwrap();

        let outcome = session.send_message("Do I need to reply to this?").await;
        assert!(matches!(outcome, SendOutcome::Sent { .. }));
        assert_eq!(session.api().calls()[0], "post_ocr");
        // The server's record of the user turn is the note itself.
        assert_eq!(session.visible_messages()[0].content, "Do I need to reply to this?");
    }

    #[tokio::test]
    async fn deleting_the_active_chat_returns_to_new_chat_mode() {
        let mut session = ChatSession::new(MockApi::with_chats(2, 2));
        session.fetch_chats().await.unwrap();
        let active = session.active_chat().unwrap();
        session.set_input("half typed");

        session.delete_chat(active).await.unwrap();
        assert_eq!(session.active_chat(), None);
        assert_eq!(session.chats().len(), 1);
        assert_eq!(session.input_value(), "");
    }

    #[tokio::test]
    async fn deleting_another_chat_keeps_the_active_one() {
        let mut session = ChatSession::new(MockApi::with_chats(2, 2));
        session.fetch_chats().await.unwrap();
        let active = session.active_chat().unwrap();
        let other = session.chats()[1].chat.id;

        session.delete_chat(other).await.unwrap();
        assert_eq!(session.active_chat(), Some(active));
    }

    #[tokio::test]
    async fn new_chat_clears_pending_state() {
        let mut session = ChatSession::new(MockApi::with_chats(1, 2));
        session.fetch_chats().await.unwrap();
        session.set_input("draft");
        session.select_image(png("a.png")).unwrap();

        session.new_chat();
        assert_eq!(session.active_chat(), None);
        assert_eq!(session.input_value(), "");
        assert!(session.selected_image().is_none());
        assert!(session.visible_messages().is_empty());
        assert_eq!(session.chats().len(), 1);
    }
}
