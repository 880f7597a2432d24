use crate::assembler::ResponseAssembler;
use crate::audio::AudioPlaybackController;
use crate::backend::{ChatCompletion, Visualization};
use crate::error::{
    AudioError, ErrorNotice, InputError, MAX_IMAGE_BYTES, MAX_MESSAGE_CHARS, SessionError,
};
use crate::history::{
    ConversationHistoryStore, HistoryCache, RECENT_CONTEXT_LEN, Snapshot, SnapshotWriter,
    load_snapshot,
};
use crate::locale::{self, VoiceCatalog};
use globo_types::{Message, MessageContent, MessageDraft, MessageId, Mode, VoiceProfile};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
struct SessionState {
    mode: Mode,
    loading: bool,
    last_error: Option<ErrorNotice>,
    /// Bumped on every mode switch; replies of an older epoch are discarded.
    epoch: u64,
}

/// Orchestrates one tutoring conversation.
///
/// At most one exchange is in flight: a submit while `loading` is rejected with
/// [`SessionError::Busy`] and changes nothing. Locks are never held across an await
/// nor while the history cache is written.
pub struct SessionController {
    chat: Arc<dyn ChatCompletion>,
    visualization: Option<Arc<dyn Visualization>>,
    audio: Option<Arc<AudioPlaybackController>>,
    writer: Option<Arc<SnapshotWriter>>,
    voices: VoiceCatalog,
    assembler: ResponseAssembler,
    history: Mutex<ConversationHistoryStore>,
    state: Mutex<SessionState>,
}

pub struct SessionBuilder {
    chat: Arc<dyn ChatCompletion>,
    visualization: Option<Arc<dyn Visualization>>,
    audio: Option<Arc<AudioPlaybackController>>,
    cache: Option<Arc<dyn HistoryCache>>,
    voices: VoiceCatalog,
}

impl SessionBuilder {
    pub fn with_visualization(mut self, visualization: Arc<dyn Visualization>) -> Self {
        self.visualization = Some(visualization);
        self
    }

    pub fn with_audio(mut self, audio: Arc<AudioPlaybackController>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn HistoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_voices(mut self, voices: VoiceCatalog) -> Self {
        self.voices = voices;
        self
    }

    /// Creates the session with its history seeded by the welcome message of `mode`.
    pub fn build(self, mode: Mode) -> SessionController {
        let assembler = ResponseAssembler::new();
        let history = ConversationHistoryStore::seeded(assembler.welcome(mode));
        SessionController {
            chat: self.chat,
            visualization: self.visualization,
            audio: self.audio,
            writer: self.cache.map(|cache| Arc::new(SnapshotWriter::new(cache))),
            voices: self.voices,
            assembler,
            history: Mutex::new(history),
            state: Mutex::new(SessionState {
                mode,
                loading: false,
                last_error: None,
                epoch: 0,
            }),
        }
    }
}

impl SessionController {
    pub fn builder(chat: Arc<dyn ChatCompletion>) -> SessionBuilder {
        SessionBuilder {
            chat,
            visualization: None,
            audio: None,
            cache: None,
            voices: VoiceCatalog::default(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> MutexGuard<'_, ConversationHistoryStore> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Mode {
        self.lock_state().mode
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().loading
    }

    pub fn last_error(&self) -> Option<ErrorNotice> {
        self.lock_state().last_error.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_history().messages().to_vec()
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.lock_history().get(id).cloned()
    }

    /// Voice of the current mode.
    pub fn voice(&self) -> VoiceProfile {
        self.voices.for_mode(self.mode()).clone()
    }

    pub fn audio(&self) -> Option<&Arc<AudioPlaybackController>> {
        self.audio.as_ref()
    }

    /// Runs one exchange: appends the user message, asks the chat collaborator,
    /// appends the normalized reply, then enriches it with a visualization and
    /// narrates it when asked to.
    pub async fn submit(&self, raw: &str) -> Result<Message, SessionError> {
        let (mode, epoch, content, context, snapshot) = {
            let mut state = self.lock_state();
            if state.loading {
                tracing::debug!("Ignoring submit while a request is in flight");
                return Err(SessionError::Busy);
            }
            let content = match validate_input(raw) {
                Ok(content) => content,
                Err(e) => {
                    let err = SessionError::Input(e);
                    tracing::debug!("Rejected input: {}", err);
                    state.last_error = Some(locale::error_notice(state.mode, &err));
                    return Err(err);
                }
            };

            let mut history = self.lock_history();
            let context = history.recent_context(RECENT_CONTEXT_LEN);
            history.append(MessageDraft::user(content.clone()));
            let snapshot = self.snapshot(state.mode, &history);

            state.loading = true;
            state.last_error = None;
            (state.mode, state.epoch, content, context, snapshot)
        };
        self.persist(snapshot).await;

        tracing::debug!(
            "Requesting completion (mode: {}, image: {}, context: {})",
            mode,
            content.is_image(),
            context.len()
        );
        let reply = match self.chat.complete(&content, mode, &context).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Chat completion failed: {}", e);
                let err = SessionError::Backend(e);
                self.fail(epoch, &err);
                return Err(err);
            }
        };

        let assembled = self.assembler.normalize(reply);
        let (message, snapshot) = {
            let state = self.lock_state();
            if state.epoch != epoch {
                tracing::debug!("Discarding reply that arrived after a mode switch");
                return Err(SessionError::Stale);
            }
            let mut history = self.lock_history();
            let message = history.append(assembled.draft);
            (message, self.snapshot(mode, &history))
        };
        self.persist(snapshot).await;

        let message = match (assembled.visualization_query, self.visualization.as_ref()) {
            (Some(query), Some(visualization)) => {
                self.enrich(epoch, mode, message, &query, visualization.as_ref())
                    .await
            }
            _ => message,
        };

        {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                tracing::debug!("Discarding reply whose conversation was reset while enriching");
                return Err(SessionError::Stale);
            }
            state.loading = false;
        }

        if message.auto_narrate() {
            self.narrate(&message, mode).await;
        }
        Ok(message)
    }

    async fn enrich(
        &self,
        epoch: u64,
        mode: Mode,
        message: Message,
        query: &str,
        visualization: &dyn Visualization,
    ) -> Message {
        tracing::debug!("Fetching visualization for {:?}", query);
        let image = match visualization.visualize(query).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Visualization failed, keeping the text reply: {}", e);
                return message;
            }
        };

        let (message, snapshot) = {
            let state = self.lock_state();
            if state.epoch != epoch {
                return message;
            }
            let mut history = self.lock_history();
            if !history.attach_visualization(message.id(), image) {
                return message;
            }
            let updated = history.get(message.id()).cloned().unwrap_or(message);
            (updated, self.snapshot(mode, &history))
        };
        self.persist(snapshot).await;
        message
    }

    async fn narrate(&self, message: &Message, mode: Mode) {
        let Some(audio) = self.audio.as_ref() else {
            return;
        };
        let Some(text) = message.content().as_text() else {
            return;
        };
        match audio.play(text, self.voices.for_mode(mode)).await {
            Ok(()) => {}
            Err(AudioError::Superseded) => {
                tracing::debug!("Narration of message {} was superseded", message.id())
            }
            Err(e) => tracing::warn!("Narration of message {} failed: {}", message.id(), e),
        }
    }

    fn fail(&self, epoch: u64, err: &SessionError) {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            return;
        }
        state.loading = false;
        state.last_error = Some(locale::error_notice(state.mode, err));
    }

    /// Hard reset into `mode`: stops audio and reseeds the history with the welcome message.
    pub fn switch_mode(&self, mode: Mode) -> Message {
        if let Some(audio) = self.audio.as_ref() {
            audio.stop();
        }
        let (seed, snapshot) = {
            let mut state = self.lock_state();
            state.mode = mode;
            state.loading = false;
            state.last_error = None;
            state.epoch += 1;

            let mut history = self.lock_history();
            let seed = history.reset(self.assembler.welcome(mode));
            (seed, self.snapshot(mode, &history))
        };
        self.persist_now(snapshot);
        tracing::info!("Switched to {} mode", mode);
        seed
    }

    /// Narrates a message of the conversation with the voice of the current mode.
    pub async fn play_message(&self, id: MessageId) -> Result<(), SessionError> {
        let message = self.message(id).ok_or(SessionError::UnknownMessage(id))?;
        let audio = self.audio.as_ref().ok_or(AudioError::Unavailable)?;
        let text = message.content().as_text().unwrap_or_default();
        audio.play(text, &self.voice()).await?;
        Ok(())
    }

    /// Stops narration. Returns `false` when nothing was playing.
    pub fn stop_audio(&self) -> bool {
        self.audio.as_ref().is_some_and(|audio| audio.stop())
    }

    /// Replaces the conversation with the cached one for the current mode, if any.
    pub fn restore_from_cache(&self) -> bool {
        let Some(writer) = self.writer.as_ref() else {
            return false;
        };
        let (mode, epoch) = {
            let state = self.lock_state();
            if state.loading {
                return false;
            }
            (state.mode, state.epoch)
        };
        let Some(messages) = load_snapshot(writer.cache(), mode) else {
            return false;
        };

        let state = self.lock_state();
        if state.loading || state.epoch != epoch {
            tracing::debug!("Conversation changed while reading the cache, not restoring");
            return false;
        }
        tracing::info!("Restored {} cached messages", messages.len());
        self.lock_history().restore(messages);
        true
    }

    fn snapshot(&self, mode: Mode, history: &ConversationHistoryStore) -> Option<Snapshot> {
        self.writer
            .as_ref()
            .map(|writer| writer.snapshot(mode, history.messages()))
    }

    /// Writes a snapshot on the blocking pool.
    async fn persist(&self, snapshot: Option<Snapshot>) {
        let (Some(writer), Some(snapshot)) = (self.writer.clone(), snapshot) else {
            return;
        };
        if let Err(e) = tokio::task::spawn_blocking(move || writer.write(snapshot)).await {
            tracing::warn!("History cache write task failed: {}", e);
        }
    }

    fn persist_now(&self, snapshot: Option<Snapshot>) {
        if let (Some(writer), Some(snapshot)) = (self.writer.as_ref(), snapshot) {
            writer.write(snapshot);
        }
    }
}

/// Checks raw front-end input and turns it into message content.
///
/// Text is trimmed and limited to [`MAX_MESSAGE_CHARS`] characters. Images arrive as
/// the image marker followed by an `image/*` data URL of at most [`MAX_IMAGE_BYTES`]
/// decoded bytes, or by a plain `http(s)` URL.
pub fn validate_input(raw: &str) -> Result<MessageContent, InputError> {
    match MessageContent::parse(raw) {
        MessageContent::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(InputError::Empty);
            }
            let len = text.chars().count();
            if len > MAX_MESSAGE_CHARS {
                return Err(InputError::TooLong {
                    len,
                    max: MAX_MESSAGE_CHARS,
                });
            }
            Ok(MessageContent::text(text))
        }
        MessageContent::Image(url) => {
            validate_image(&url)?;
            Ok(MessageContent::Image(url))
        }
    }
}

fn validate_image(url: &str) -> Result<(), InputError> {
    if url.is_empty() {
        return Err(InputError::Empty);
    }
    if url.starts_with("https://") || url.starts_with("http://") {
        return Ok(());
    }
    let Some((header, payload)) = url.strip_prefix("data:").and_then(|u| u.split_once(','))
    else {
        return Err(InputError::NotAnImage);
    };
    if !header.starts_with("image/") {
        return Err(InputError::NotAnImage);
    }
    let payload = payload.trim().trim_end_matches('=');
    if payload.is_empty() {
        return Err(InputError::Empty);
    }
    let bytes = payload.len() * 3 / 4;
    if bytes > MAX_IMAGE_BYTES {
        return Err(InputError::ImageTooLarge {
            bytes,
            max: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioOutput, AudioResource};
    use crate::backend::{MockChatCompletion, MockNarration, MockVisualization};
    use crate::error::{BackendError, ErrorKind};
    use crate::history::MemoryHistoryCache;
    use async_trait::async_trait;
    use globo_types::{AudioClip, ChatReply, ContextEntry, Role, VisualizationImage};
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;
    use tokio::sync::{Notify, oneshot};

    /// Chat collaborator that blocks every call until the gate opens.
    struct GatedChat {
        entered: Notify,
        gate: Notify,
        reply: ChatReply,
    }

    impl GatedChat {
        fn new(reply: ChatReply) -> Self {
            Self {
                entered: Notify::new(),
                gate: Notify::new(),
                reply,
            }
        }
    }

    #[async_trait]
    impl ChatCompletion for GatedChat {
        async fn complete(
            &self,
            _content: &MessageContent,
            _mode: Mode,
            _context: &[ContextEntry],
        ) -> Result<ChatReply, BackendError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(self.reply.clone())
        }
    }

    struct GatedVisualization {
        entered: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl Visualization for GatedVisualization {
        async fn visualize(&self, query: &str) -> Result<VisualizationImage, BackendError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(VisualizationImage {
                url: format!("https://example.test/{}.gif", query.replace(' ', "-")),
                alt: None,
            })
        }
    }

    /// Reads the session back from inside `store`, which only returns if the
    /// session locks are free during the write.
    #[derive(Default)]
    struct ReentrantCache {
        session: OnceLock<Weak<SessionController>>,
        seen: Mutex<Vec<(usize, bool)>>,
        inner: MemoryHistoryCache,
    }

    impl HistoryCache for ReentrantCache {
        fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.load(key)
        }

        fn store(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if let Some(session) = self.session.get().and_then(Weak::upgrade) {
                let seen = (session.messages().len(), session.is_loading());
                self.seen.lock().unwrap().push(seen);
            }
            self.inner.store(key, value)
        }
    }

    struct SilentOutput;

    struct SilentResource;

    impl AudioResource for SilentResource {
        fn release(&mut self) {}
    }

    impl AudioOutput for SilentOutput {
        fn open(
            &self,
            _clip: AudioClip,
            _voice: &VoiceProfile,
            _finished: oneshot::Sender<()>,
        ) -> Result<Box<dyn AudioResource>, AudioError> {
            Ok(Box::new(SilentResource))
        }
    }

    fn replying(reply: ChatReply) -> MockChatCompletion {
        let mut chat = MockChatCompletion::new();
        chat.expect_complete()
            .returning(move |_, _, _| Ok(reply.clone()));
        chat
    }

    fn audio_with(narration: MockNarration) -> Arc<AudioPlaybackController> {
        Arc::new(
            AudioPlaybackController::new(Arc::new(narration), Arc::new(SilentOutput))
                .with_settle_delay(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn submit_appends_the_exchange_in_order() {
        let mut chat = MockChatCompletion::new();
        chat.expect_complete()
            .withf(|content, mode, context| {
                content.as_text() == Some("¿Cuánto es 3 x 4?")
                    && *mode == Mode::Standard
                    && context.len() == 1
                    && context[0].role == Role::Assistant
            })
            .times(1)
            .returning(|_, _, _| Ok(ChatReply::text("1) Cuenta 3 grupos de 4\n2) Son 12")));
        let session = SessionController::builder(Arc::new(chat)).build(Mode::Standard);

        let reply = session.submit("  ¿Cuánto es 3 x 4?  ").await.unwrap();

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role(), Role::User);
        assert_eq!(messages[2], reply);
        assert_eq!(reply.steps().map(|s| s.len()), Some(2));
        assert!(!session.is_loading());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn submit_while_loading_is_a_no_op() {
        let chat = Arc::new(GatedChat::new(ChatReply::text("listo")));
        let session = Arc::new(SessionController::builder(chat.clone()).build(Mode::Standard));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("primera").await })
        };
        chat.entered.notified().await;

        assert!(session.is_loading());
        let count = session.messages().len();
        assert_eq!(session.submit("segunda").await, Err(SessionError::Busy));
        assert_eq!(session.messages().len(), count);

        chat.gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(session.messages().len(), 3);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_request() {
        let mut chat = MockChatCompletion::new();
        chat.expect_complete().never();
        let session = SessionController::builder(Arc::new(chat)).build(Mode::Developer);

        assert_eq!(
            session.submit(" \n ").await,
            Err(SessionError::Input(InputError::Empty))
        );
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            session.submit(&long).await,
            Err(SessionError::Input(InputError::TooLong { .. }))
        ));

        assert_eq!(session.messages().len(), 1);
        assert!(!session.is_loading());
        let notice = session.last_error().unwrap();
        assert_eq!(notice.kind, ErrorKind::InputInvalid);
        assert_eq!(
            notice.message,
            "Message is too long. Please limit your message to 4000 characters."
        );
    }

    #[tokio::test]
    async fn backend_failure_records_a_localized_error() {
        let mut chat = MockChatCompletion::new();
        let mut calls = 0;
        chat.expect_complete().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(BackendError::RateLimited)
            } else {
                Ok(ChatReply::text("ok"))
            }
        });
        let session = SessionController::builder(Arc::new(chat)).build(Mode::Standard);

        let err = session.submit("hola").await.unwrap_err();
        assert_eq!(err, SessionError::Backend(BackendError::RateLimited));
        assert_eq!(session.messages().len(), 2);
        assert!(!session.is_loading());
        assert_eq!(session.last_error().map(|n| n.kind), Some(ErrorKind::RateLimited));

        session.submit("otra vez").await.unwrap();
        assert!(session.last_error().is_none());
        assert_eq!(session.messages().len(), 4);
    }

    #[tokio::test]
    async fn visualization_is_attached_to_the_reply() {
        let reply = ChatReply {
            visualization_query: Some("rectangle 3 by 4".to_string()),
            ..ChatReply::text("El área es 12")
        };
        let image = VisualizationImage {
            url: "https://example.test/plot.gif".to_string(),
            alt: Some("rectangle".to_string()),
        };
        let mut visualization = MockVisualization::new();
        let returned = image.clone();
        visualization
            .expect_visualize()
            .withf(|query| query == "rectangle 3 by 4")
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        let session = SessionController::builder(Arc::new(replying(reply)))
            .with_visualization(Arc::new(visualization))
            .build(Mode::Standard);

        let message = session.submit("área de 3 por 4").await.unwrap();

        assert_eq!(message.visualization(), Some(&image));
        assert_eq!(session.messages()[2].visualization(), Some(&image));
    }

    #[tokio::test]
    async fn visualization_failure_keeps_the_text_reply() {
        let reply = ChatReply {
            visualization_query: Some("pie chart 1/4".to_string()),
            ..ChatReply::text("Un cuarto")
        };
        let mut visualization = MockVisualization::new();
        visualization
            .expect_visualize()
            .returning(|_| Err(BackendError::Transient("timeout".to_string())));
        let session = SessionController::builder(Arc::new(replying(reply)))
            .with_visualization(Arc::new(visualization))
            .build(Mode::Standard);

        let message = session.submit("1/4").await.unwrap();

        assert!(message.visualization().is_none());
        assert_eq!(session.messages().len(), 3);
        assert!(session.last_error().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn switch_mode_resets_to_a_single_welcome() {
        let mut chat = MockChatCompletion::new();
        chat.expect_complete()
            .returning(|_, _, _| Err(BackendError::Transient("down".to_string())));
        let session = SessionController::builder(Arc::new(chat)).build(Mode::Standard);
        let _ = session.submit("hola").await;
        assert!(session.last_error().is_some());

        let seed = session.switch_mode(Mode::Developer);

        assert_eq!(session.messages(), vec![seed.clone()]);
        assert!(seed.auto_narrate());
        assert!(seed.flat_text().starts_with("Hello RC"));
        assert_eq!(session.mode(), Mode::Developer);
        assert!(session.last_error().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn reply_arriving_after_a_mode_switch_is_discarded() {
        let chat = Arc::new(GatedChat::new(ChatReply::text("tarde")));
        let session = Arc::new(SessionController::builder(chat.clone()).build(Mode::Standard));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("pregunta").await })
        };
        chat.entered.notified().await;

        session.switch_mode(Mode::Developer);
        chat.gate.notify_one();

        assert_eq!(pending.await.unwrap(), Err(SessionError::Stale));
        assert_eq!(session.messages().len(), 1);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn reply_enriched_across_a_mode_switch_is_discarded_unspoken() {
        let reply = ChatReply {
            visualization_query: Some("circle radius 2".to_string()),
            auto_narrate: Some(true),
            ..ChatReply::text("respuesta vieja")
        };
        let visualization = Arc::new(GatedVisualization {
            entered: Notify::new(),
            gate: Notify::new(),
        });
        let mut narration = MockNarration::new();
        narration.expect_narrate().never();
        let audio = audio_with(narration);
        let session = Arc::new(
            SessionController::builder(Arc::new(replying(reply)))
                .with_visualization(visualization.clone())
                .with_audio(audio.clone())
                .build(Mode::Standard),
        );

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("área del círculo").await })
        };
        visualization.entered.notified().await;

        let seed = session.switch_mode(Mode::Developer);
        visualization.gate.notify_one();

        assert_eq!(pending.await.unwrap(), Err(SessionError::Stale));
        assert_eq!(session.messages(), vec![seed]);
        assert!(!session.is_loading());
        assert!(audio.now_playing().is_none());
    }

    #[tokio::test]
    async fn auto_narrated_replies_are_played_with_the_mode_voice() {
        let reply = ChatReply {
            auto_narrate: Some(true),
            ..ChatReply::text("Muy bien")
        };
        let mut narration = MockNarration::new();
        narration
            .expect_narrate()
            .withf(|text, voice| text == "Muy bien" && voice.playback_rate == 0.95)
            .times(1)
            .returning(|_, _| Ok(AudioClip::pcm16(vec![0, 0, 1, 0], 24_000)));
        let audio = audio_with(narration);
        let session = SessionController::builder(Arc::new(replying(reply)))
            .with_audio(audio.clone())
            .build(Mode::Standard);

        session.submit("2 + 2").await.unwrap();

        assert_eq!(audio.now_playing().as_deref(), Some("Muy bien"));
        assert!(session.stop_audio());
        assert!(!session.stop_audio());
    }

    #[tokio::test]
    async fn audio_failures_do_not_touch_the_conversation() {
        let reply = ChatReply {
            auto_narrate: Some(true),
            ..ChatReply::text("Muy bien")
        };
        let mut narration = MockNarration::new();
        narration.expect_narrate().returning(|_, _| {
            Err(crate::error::NarrationError::Service("voice not found".to_string()))
        });
        let session = SessionController::builder(Arc::new(replying(reply)))
            .with_audio(audio_with(narration))
            .build(Mode::Standard);

        assert!(session.submit("2 + 2").await.is_ok());
        assert_eq!(session.messages().len(), 3);
        assert!(session.last_error().is_none());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn play_message_reports_unknown_ids_and_missing_audio() {
        let session =
            SessionController::builder(Arc::new(MockChatCompletion::new())).build(Mode::Standard);
        let welcome = session.messages()[0].id();

        assert_eq!(
            session.play_message(MessageId::new(99)).await,
            Err(SessionError::UnknownMessage(MessageId::new(99)))
        );
        assert_eq!(
            session.play_message(welcome).await,
            Err(SessionError::Audio(AudioError::Unavailable))
        );
    }

    #[tokio::test]
    async fn conversation_is_restored_from_the_cache() {
        let cache: Arc<dyn HistoryCache> = Arc::new(MemoryHistoryCache::new());
        let first = SessionController::builder(Arc::new(replying(ChatReply::text("12"))))
            .with_cache(cache.clone())
            .build(Mode::Standard);
        first.submit("3 x 4").await.unwrap();

        let second = SessionController::builder(Arc::new(replying(ChatReply::text("20"))))
            .with_cache(cache.clone())
            .build(Mode::Standard);
        assert!(second.restore_from_cache());
        assert_eq!(second.messages(), first.messages());

        let next = second.submit("4 x 5").await.unwrap();
        assert!(next.id() > first.messages()[2].id());

        let developer = SessionController::builder(Arc::new(MockChatCompletion::new()))
            .with_cache(cache)
            .build(Mode::Developer);
        assert!(!developer.restore_from_cache());
    }

    #[tokio::test]
    async fn cache_is_written_without_holding_the_session_locks() {
        let cache = Arc::new(ReentrantCache::default());
        let session = Arc::new(
            SessionController::builder(Arc::new(replying(ChatReply::text("12"))))
                .with_cache(cache.clone())
                .build(Mode::Standard),
        );
        assert!(cache.session.set(Arc::downgrade(&session)).is_ok());

        session.submit("3 x 4").await.unwrap();
        session.switch_mode(Mode::Developer);

        assert_eq!(
            *cache.seen.lock().unwrap(),
            vec![(2, true), (3, true), (1, false)]
        );
        assert_eq!(
            load_snapshot(cache.as_ref(), Mode::Standard).map(|m| m.len()),
            Some(3)
        );
    }

    #[test]
    fn image_input_is_checked_for_type_and_size() {
        assert!(validate_input("[PHOTO]data:image/png;base64,iVBORw0KGgo=").unwrap().is_image());
        assert!(validate_input("[PHOTO]https://example.test/worksheet.jpg").is_ok());
        assert_eq!(validate_input("[PHOTO]"), Err(InputError::Empty));
        assert_eq!(
            validate_input("[PHOTO]data:application/pdf;base64,JVBERi0="),
            Err(InputError::NotAnImage)
        );

        let huge = format!("[PHOTO]data:image/jpeg;base64,{}", "A".repeat(8 * 1024 * 1024));
        assert!(matches!(
            validate_input(&huge),
            Err(InputError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn images_are_exempt_from_the_text_limit() {
        let payload = "A".repeat(MAX_MESSAGE_CHARS * 2);
        let raw = format!("[PHOTO]data:image/png;base64,{payload}");
        assert!(validate_input(&raw).is_ok());
    }
}
