use crate::asr::{SpeechRecognizer, TranscriptSource};
use crate::config::{InterviewType, InterviewerSettings, SessionConfig};
use crate::emotion::{CameraState, EmotionSampler, EmotionSnapshot, FaceDetector};
use crate::feedback::{Evaluator, FeedbackAggregator};
use crate::playback::PlaybackSink;
use crate::question::{QuestionGenerator, QuestionRequest, FALLBACK_QUESTION};
use crate::session::{SessionLog, SessionReport, Turn};
use crate::store::ReportStore;
use crate::tts::{TtsClient, TtsRequest};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

const LOG_TARGET: &str = "session::sequencer";

pub const NO_ANSWER_PLACEHOLDER: &str = "(No answer provided)";
pub const TIME_UP_SUFFIX: &str = " (Time's up)";

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Thinking,
    Speaking,
    Listening,
    Ending,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Starting => "starting",
            SessionStatus::Thinking => "thinking",
            SessionStatus::Speaking => "speaking",
            SessionStatus::Listening => "listening",
            SessionStatus::Ending => "ending",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Starting,
    Thinking,
    Speaking,
    Listening { question: String, remaining_secs: u64 },
    Ending,
}

impl Phase {
    fn status(&self) -> SessionStatus {
        match self {
            Phase::Idle => SessionStatus::Idle,
            Phase::Starting => SessionStatus::Starting,
            Phase::Thinking => SessionStatus::Thinking,
            Phase::Speaking => SessionStatus::Speaking,
            Phase::Listening { .. } => SessionStatus::Listening,
            Phase::Ending => SessionStatus::Ending,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceCause {
    NextRequested,
    TimeUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    NextQuestion,
    EndInterview,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionOutcome {
    Reported(SessionReport),
    /// Ended before any turn was recorded. Nothing is evaluated or stored.
    Discarded,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    #[error("camera access has not been granted")]
    CameraNotGranted,

    #[error("face detection models are not loaded yet")]
    DetectorNotLoaded,

    #[error("job interviews need a role and company")]
    MissingJobContext,

    #[error("a session is already in progress")]
    NotIdle,
}

/// The services a session talks to.
pub struct Collaborators {
    pub detector: Arc<dyn FaceDetector>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub questions: Arc<dyn QuestionGenerator>,
    pub tts: Arc<dyn TtsClient>,
    pub playback: Arc<dyn PlaybackSink>,
    pub evaluator: Arc<dyn Evaluator>,
    pub store: Arc<dyn ReportStore>,
    /// Reports are only persisted for a signed-in user.
    pub user_id: Option<String>,
}

/// Drives one interview at a time: ask, speak, listen, record, and finally evaluate.
///
/// Every transition goes through `&mut self`, so a user action and a countdown
/// expiry can never both close the same turn.
pub struct TurnSequencer {
    interview_type: InterviewType,
    settings: InterviewerSettings,
    config: SessionConfig,
    detector: Arc<dyn FaceDetector>,
    questions: Arc<dyn QuestionGenerator>,
    tts: Arc<dyn TtsClient>,
    playback: Arc<dyn PlaybackSink>,
    store: Arc<dyn ReportStore>,
    user_id: Option<String>,
    feedback: FeedbackAggregator<Arc<dyn Evaluator>>,
    sampler: EmotionSampler<dyn FaceDetector>,
    transcript: TranscriptSource<dyn SpeechRecognizer>,
    phase: Phase,
    log: SessionLog,
    context: Option<String>,
    capture_id: u64,
    status_tx: watch::Sender<SessionStatus>,
    question_tx: watch::Sender<String>,
    countdown_tx: watch::Sender<u64>,
}

impl TurnSequencer {
    pub fn new(
        interview_type: InterviewType,
        settings: InterviewerSettings,
        config: SessionConfig,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            detector,
            recognizer,
            questions,
            tts,
            playback,
            evaluator,
            store,
            user_id,
        } = collaborators;
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        let (question_tx, _) = watch::channel(String::new());
        let (countdown_tx, _) = watch::channel(config.answer_time.secs());
        Self {
            interview_type,
            settings,
            sampler: EmotionSampler::new(Arc::clone(&detector), config.poll_interval),
            transcript: TranscriptSource::new(recognizer),
            feedback: FeedbackAggregator::new(evaluator, config.materiality_threshold),
            config,
            detector,
            questions,
            tts,
            playback,
            store,
            user_id,
            phase: Phase::Idle,
            log: SessionLog::new(),
            context: None,
            capture_id: 0,
            status_tx,
            question_tx,
            countdown_tx,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.phase.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_question(&self) -> watch::Receiver<String> {
        self.question_tx.subscribe()
    }

    /// Seconds left for the current answer.
    pub fn subscribe_countdown(&self) -> watch::Receiver<u64> {
        self.countdown_tx.subscribe()
    }

    pub fn live_transcript(&self) -> watch::Receiver<String> {
        self.transcript.live()
    }

    pub fn live_emotion(&self) -> watch::Receiver<EmotionSnapshot> {
        self.sampler.live()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    fn set_phase(&mut self, phase: Phase) {
        let status = phase.status();
        self.phase = phase;
        if self.status_tx.send_replace(status) != status {
            tracing::debug!(target: LOG_TARGET, %status, turn = self.log.len() + 1, "status changed");
        }
    }

    /// Checks the preconditions and asks the first question.
    pub async fn start(&mut self, context: Option<String>) -> Result<(), SequencerError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(SequencerError::NotIdle);
        }
        if self.detector.camera() != CameraState::Granted {
            return Err(SequencerError::CameraNotGranted);
        }
        if !self.detector.is_loaded() {
            return Err(SequencerError::DetectorNotLoaded);
        }
        let context = context
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());
        if self.interview_type.takes_context() && context.is_none() {
            return Err(SequencerError::MissingJobContext);
        }

        self.set_phase(Phase::Starting);
        self.log = SessionLog::new();
        self.context = context.filter(|_| self.interview_type.takes_context());
        tracing::info!(
            target: LOG_TARGET,
            interview_type = %self.interview_type,
            turn_limit = self.config.turn_limit.get(),
            "interview started"
        );
        self.ask_next_question().await;
        Ok(())
    }

    /// Generates, speaks, and opens the answer capture for the next question.
    ///
    /// Only runs from `Starting` or `Thinking`; any other phase is left untouched.
    async fn ask_next_question(&mut self) {
        if !matches!(self.phase, Phase::Starting | Phase::Thinking) {
            tracing::debug!(target: LOG_TARGET, phase = ?self.phase, "ask_next_question ignored");
            return;
        }
        self.set_phase(Phase::Thinking);
        let request = QuestionRequest {
            interview_type: self.interview_type,
            history: self.log.trailing(self.config.history_window).to_vec(),
            context: self.context.clone(),
            settings: self.settings,
        };
        let question = match self.questions.next_question(request).await {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "question generation failed; using fallback");
                FALLBACK_QUESTION.to_owned()
            }
        };
        self.question_tx.send_replace(question.clone());

        self.set_phase(Phase::Speaking);
        self.speak(&question).await;

        self.transcript.clear();
        self.sampler.start();
        self.transcript.start().await;
        self.capture_id += 1;
        let remaining_secs = self.config.answer_time.secs();
        self.countdown_tx.send_replace(remaining_secs);
        self.set_phase(Phase::Listening {
            question,
            remaining_secs,
        });
    }

    async fn speak(&self, text: &str) {
        let request = TtsRequest {
            text: text.to_owned(),
            voice: self.settings.voice,
        };
        let audio = match self.tts.synthesize(request).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "speech synthesis failed; continuing silently");
                return;
            }
        };
        if let Err(e) = self.playback.play(audio).await {
            tracing::warn!(target: LOG_TARGET, error = %e, "playback failed");
        }
    }

    /// Stops both captures and returns the answer text with the snapshots taken while answering.
    async fn close_capture(&mut self) -> (String, Vec<EmotionSnapshot>) {
        let answer = self.transcript.stop().await;
        self.sampler.stop();
        let emotions = self.sampler.drain_history();
        (answer.trim().to_owned(), emotions)
    }

    /// Records the current answer and moves to the next question, or finishes the
    /// session once the turn limit is reached.
    pub async fn advance(&mut self, cause: AdvanceCause) -> Option<SessionOutcome> {
        let question = match &self.phase {
            Phase::Listening { question, .. } => question.clone(),
            other => {
                tracing::debug!(target: LOG_TARGET, phase = ?other, ?cause, "advance ignored");
                return None;
            }
        };
        let (answer, emotions) = self.close_capture().await;
        let answer = if answer.is_empty() {
            NO_ANSWER_PLACEHOLDER.to_owned()
        } else if cause == AdvanceCause::TimeUp {
            format!("{answer}{TIME_UP_SUFFIX}")
        } else {
            answer
        };
        tracing::info!(
            target: LOG_TARGET,
            turn = self.log.len() + 1,
            ?cause,
            samples = emotions.len(),
            "turn recorded"
        );
        self.log.push(Turn::new(question, answer, emotions));

        if self.log.len() >= self.config.turn_limit.get() {
            return Some(self.finish().await);
        }
        self.set_phase(Phase::Thinking);
        self.ask_next_question().await;
        None
    }

    /// Ends the session early. Returns `None` when there is nothing to end.
    pub async fn end_interview(&mut self) -> Option<SessionOutcome> {
        match &self.phase {
            Phase::Idle | Phase::Ending => return None,
            Phase::Listening { question, .. } => {
                let question = question.clone();
                let (answer, emotions) = self.close_capture().await;
                if !answer.is_empty() {
                    self.log.push(Turn::new(question, answer, emotions));
                }
            }
            _ => {
                self.close_capture().await;
            }
        }
        Some(self.finish().await)
    }

    async fn finish(&mut self) -> SessionOutcome {
        self.set_phase(Phase::Ending);
        let log = std::mem::take(&mut self.log);
        let context = self.context.take();
        let turns = log.len();

        let outcome = match self
            .feedback
            .report(self.interview_type, log, context.as_deref())
            .await
        {
            None => {
                tracing::info!(target: LOG_TARGET, "interview ended without answers; nothing to report");
                SessionOutcome::Discarded
            }
            Some(report) => SessionOutcome::Reported(self.persist(report).await),
        };
        tracing::info!(target: LOG_TARGET, turns, "interview finished");
        self.set_phase(Phase::Idle);
        outcome
    }

    async fn persist(&self, report: SessionReport) -> SessionReport {
        let Some(uid) = self.user_id.as_deref() else {
            return report;
        };
        match self.store.save(uid, &report).await {
            Ok(id) => report.persisted(id, Utc::now()),
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, "failed to save interview report");
                report
            }
        }
    }

    /// One second of answer countdown. Reaching zero advances with [`AdvanceCause::TimeUp`].
    pub async fn tick_countdown(&mut self) -> Option<SessionOutcome> {
        let Phase::Listening { remaining_secs, .. } = &mut self.phase else {
            return None;
        };
        *remaining_secs = remaining_secs.saturating_sub(1);
        let remaining = *remaining_secs;
        self.countdown_tx.send_replace(remaining);
        if remaining == 0 {
            return self.advance(AdvanceCause::TimeUp).await;
        }
        None
    }

    /// Runs a whole session, taking user commands from `commands`.
    ///
    /// A closed command channel ends the interview.
    pub async fn run(
        &mut self,
        context: Option<String>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<SessionOutcome, SequencerError> {
        self.start(context).await?;

        let mut ticker = tokio::time::interval_at(Instant::now() + COUNTDOWN_STEP, COUNTDOWN_STEP);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut capture_seen = self.capture_id;

        loop {
            let finished = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::NextQuestion) => self.advance(AdvanceCause::NextRequested).await,
                    Some(SessionCommand::EndInterview) | None => {
                        Some(self.end_interview().await.unwrap_or(SessionOutcome::Discarded))
                    }
                },
                _ = ticker.tick() => self.tick_countdown().await,
            };
            if let Some(outcome) = finished {
                return Ok(outcome);
            }
            // A new answer gets a full first second.
            if self.capture_id != capture_seen {
                capture_seen = self.capture_id;
                ticker.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::{AsrError, RecognitionResult, TranscriptSink};
    use crate::config::{AnswerTimeLimit, TurnLimit};
    use crate::emotion::EmotionError;
    use crate::feedback::{EvaluationRequest, FeedbackError, FeedbackScores};
    use crate::genai::GenAiError;
    use crate::playback::PlaybackError;
    use crate::question::QuestionError;
    use crate::store::{MemoryReportStore, StoreError};
    use crate::tts::{TtsAudio, TtsError};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubDetector {
        camera: CameraState,
        loaded: bool,
        face: Option<EmotionSnapshot>,
    }

    impl FaceDetector for StubDetector {
        fn camera(&self) -> CameraState {
            self.camera
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }

        fn detect(&self) -> BoxFuture<'_, Result<Option<EmotionSnapshot>, EmotionError>> {
            let face = self.face;
            async move { Ok(face) }.boxed()
        }
    }

    /// Each capture immediately "hears" the next scripted answer.
    #[derive(Default)]
    struct ScriptedRecognizer {
        answers: Mutex<VecDeque<String>>,
        sink: Mutex<Option<TranscriptSink>>,
    }

    impl ScriptedRecognizer {
        fn with(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                sink: Mutex::new(None),
            }
        }

        fn say(&self, text: &str) {
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.update(&[RecognitionResult::final_text(text)]);
            }
        }
    }

    impl SpeechRecognizer for ScriptedRecognizer {
        fn start(&self, sink: TranscriptSink) -> BoxFuture<'_, Result<(), AsrError>> {
            async move {
                if let Some(answer) = self.answers.lock().unwrap().pop_front() {
                    if !answer.is_empty() {
                        sink.update(&[RecognitionResult::final_text(answer)]);
                    }
                }
                *self.sink.lock().unwrap() = Some(sink);
                Ok(())
            }
            .boxed()
        }

        fn stop(&self) -> BoxFuture<'_, Result<(), AsrError>> {
            async move {
                self.sink.lock().unwrap().take();
                Ok(())
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct StubQuestions {
        fail: bool,
        requests: Mutex<Vec<QuestionRequest>>,
    }

    impl QuestionGenerator for StubQuestions {
        fn next_question(
            &self,
            request: QuestionRequest,
        ) -> BoxFuture<'_, Result<String, QuestionError>> {
            async move {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request);
                if self.fail {
                    return Err(QuestionError::Empty);
                }
                Ok(format!("Question {}", requests.len()))
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct StubTts {
        fail: bool,
    }

    impl TtsClient for StubTts {
        fn synthesize(&self, _request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
            let fail = self.fail;
            async move {
                if fail {
                    return Err(TtsError::NoAudio);
                }
                Ok(TtsAudio {
                    sample_rate_hz: 24_000,
                    channels: 1,
                    pcm_i16: vec![0; 240],
                })
            }
            .boxed()
        }
    }

    #[derive(Default)]
    struct CountingPlayback {
        played: AtomicUsize,
    }

    impl PlaybackSink for CountingPlayback {
        fn play(&self, _audio: TtsAudio) -> BoxFuture<'_, Result<(), PlaybackError>> {
            self.played.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }.boxed()
        }
    }

    struct StubEvaluator {
        fail: bool,
        calls: AtomicUsize,
    }

    impl Evaluator for StubEvaluator {
        fn evaluate(
            &self,
            _request: EvaluationRequest,
        ) -> BoxFuture<'_, Result<FeedbackScores, FeedbackError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            async move {
                if fail {
                    return Err(FeedbackError::GenAi(GenAiError::EmptyResponse));
                }
                Ok(FeedbackScores {
                    clarity: 8.0,
                    confidence: 7.0,
                    answer_quality: 6.0,
                    engagement: 9.0,
                    strengths: vec!["Concise".to_owned()],
                    areas_for_improvement: vec!["Eye contact".to_owned()],
                    overall_feedback: "Well done.".to_owned(),
                })
            }
            .boxed()
        }
    }

    struct FailingStore;

    impl ReportStore for FailingStore {
        fn save<'a>(
            &'a self,
            _uid: &'a str,
            _report: &'a SessionReport,
        ) -> BoxFuture<'a, Result<String, StoreError>> {
            async {
                Err(StoreError::Api {
                    status: 403,
                    body: "PERMISSION_DENIED".to_owned(),
                })
            }
            .boxed()
        }

        fn history<'a>(
            &'a self,
            _uid: &'a str,
        ) -> BoxFuture<'a, Result<Vec<SessionReport>, StoreError>> {
            async { Ok(Vec::new()) }.boxed()
        }

        fn clear<'a>(&'a self, _uid: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
            async { Ok(0) }.boxed()
        }
    }

    struct Harness {
        detector: StubDetector,
        recognizer: Arc<ScriptedRecognizer>,
        questions: Arc<StubQuestions>,
        tts: StubTts,
        playback: Arc<CountingPlayback>,
        evaluator: Arc<StubEvaluator>,
        store: Arc<dyn ReportStore>,
        memory: Arc<MemoryReportStore>,
        config: SessionConfig,
        interview_type: InterviewType,
    }

    impl Harness {
        fn new(answers: &[&str]) -> Self {
            let memory = Arc::new(MemoryReportStore::new());
            Self {
                detector: StubDetector {
                    camera: CameraState::Granted,
                    loaded: true,
                    face: None,
                },
                recognizer: Arc::new(ScriptedRecognizer::with(answers)),
                questions: Arc::new(StubQuestions::default()),
                tts: StubTts::default(),
                playback: Arc::new(CountingPlayback::default()),
                evaluator: Arc::new(StubEvaluator {
                    fail: false,
                    calls: AtomicUsize::new(0),
                }),
                store: memory.clone(),
                memory,
                config: SessionConfig::default(),
                interview_type: InterviewType::Casual,
            }
        }

        fn build(&self, detector: StubDetector, tts: StubTts) -> TurnSequencer {
            TurnSequencer::new(
                self.interview_type,
                InterviewerSettings::default(),
                self.config.clone(),
                Collaborators {
                    detector: Arc::new(detector),
                    recognizer: self.recognizer.clone(),
                    questions: self.questions.clone(),
                    tts: Arc::new(tts),
                    playback: self.playback.clone(),
                    evaluator: self.evaluator.clone(),
                    store: self.store.clone(),
                    user_id: Some("user-1".to_owned()),
                },
            )
        }

        fn sequencer(&mut self) -> TurnSequencer {
            let detector = std::mem::replace(
                &mut self.detector,
                StubDetector {
                    camera: CameraState::Granted,
                    loaded: true,
                    face: None,
                },
            );
            let tts = std::mem::take(&mut self.tts);
            self.build(detector, tts)
        }
    }

    fn reported(outcome: Option<SessionOutcome>) -> SessionReport {
        match outcome {
            Some(SessionOutcome::Reported(report)) => report,
            other => panic!("expected a report, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_completes_after_turn_limit() {
        let mut h = Harness::new(&["a1", "a2", "a3", "a4", "a5"]);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        assert_eq!(seq.status(), SessionStatus::Listening);
        assert_eq!(*seq.subscribe_question().borrow(), "Question 1");

        for _ in 0..4 {
            assert!(seq.advance(AdvanceCause::NextRequested).await.is_none());
        }
        let report = reported(seq.advance(AdvanceCause::NextRequested).await);

        let answers: Vec<_> = report.log.turns().iter().map(|t| t.answer.as_str()).collect();
        assert_eq!(answers, ["a1", "a2", "a3", "a4", "a5"]);
        assert_eq!(report.log.turns()[4].question, "Question 5");
        assert_eq!(report.feedback.clarity, 8.0);
        assert!(report.id.is_some());
        assert_eq!(seq.status(), SessionStatus::Idle);
        assert_eq!(h.memory.history("user-1").await.unwrap().len(), 1);
        assert_eq!(h.playback.played.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn job_session_without_a_face_records_empty_expression_series() {
        let mut h = Harness::new(&["a1", "a2", "a3", "a4", "a5"]);
        h.interview_type = InterviewType::Job;
        let mut seq = h.sequencer();
        seq.start(Some("Data analyst at a bank".to_owned()))
            .await
            .expect("start");

        let mut outcome = None;
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            outcome = seq.advance(AdvanceCause::NextRequested).await;
        }
        let report = reported(outcome);

        assert_eq!(report.interview_type, InterviewType::Job);
        assert_eq!(report.log.len(), 5);
        assert!(report.log.turns().iter().all(|t| t.emotion_data.is_empty()));
        assert!(report.id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn asking_outside_the_question_flow_is_ignored() {
        let mut h = Harness::new(&["first answer", "second"]);
        h.detector.camera = CameraState::Denied;
        let mut seq = h.sequencer();
        assert_eq!(seq.start(None).await, Err(SequencerError::CameraNotGranted));
        seq.ask_next_question().await;
        assert_eq!(seq.status(), SessionStatus::Idle);
        assert!(h.questions.requests.lock().unwrap().is_empty());

        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        seq.ask_next_question().await;
        assert_eq!(seq.status(), SessionStatus::Listening);
        assert_eq!(*seq.subscribe_question().borrow(), "Question 1");
        assert_eq!(h.questions.requests.lock().unwrap().len(), 1);

        let report = reported(seq.end_interview().await);
        let turns: Vec<_> = report
            .log
            .turns()
            .iter()
            .map(|t| (t.question.as_str(), t.answer.as_str()))
            .collect();
        assert_eq!(turns, [("Question 1", "first answer")]);
    }

    #[tokio::test(start_paused = true)]
    async fn question_requests_carry_trailing_window() {
        let mut h = Harness::new(&["a1", "a2", "a3", "a4", "a5"]);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        for _ in 0..4 {
            seq.advance(AdvanceCause::NextRequested).await;
        }
        let requests = h.questions.requests.lock().unwrap();
        assert_eq!(requests.len(), 5);
        assert!(requests[0].history.is_empty());
        let window: Vec<_> = requests[4].history.iter().map(|t| t.answer.as_str()).collect();
        assert_eq!(window, ["a2", "a3", "a4"]);
        assert!(requests.iter().all(|r| r.context.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn early_end_keeps_partial_answer_without_decoration() {
        let mut h = Harness::new(&["first answer"]);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        seq.advance(AdvanceCause::NextRequested).await;
        h.recognizer.say("half an answer");

        let report = reported(seq.end_interview().await);
        assert_eq!(report.log.len(), 2);
        assert_eq!(report.log.turns()[1].answer, "half an answer");
        assert_eq!(report.log.turns()[1].question, "Question 2");
    }

    #[tokio::test(start_paused = true)]
    async fn early_end_with_blank_transcript_adds_nothing() {
        let mut h = Harness::new(&["first answer"]);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        seq.advance(AdvanceCause::NextRequested).await;

        let report = reported(seq.end_interview().await);
        assert_eq!(report.log.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ending_with_empty_log_discards() {
        let mut h = Harness::new(&[]);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");

        assert_eq!(seq.end_interview().await, Some(SessionOutcome::Discarded));
        assert_eq!(seq.status(), SessionStatus::Idle);
        assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 0);
        assert!(h.memory.history("user-1").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_end_is_a_no_op() {
        let mut h = Harness::new(&["only"]);
        let mut seq = h.sequencer();
        assert!(seq.end_interview().await.is_none());

        seq.start(None).await.expect("start");
        reported(seq.end_interview().await);
        assert!(seq.end_interview().await.is_none());
        assert_eq!(h.evaluator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.memory.history("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_records_placeholder_and_moves_on() {
        let mut h = Harness::new(&[]);
        h.config.answer_time = AnswerTimeLimit::new(3).expect("limit");
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        let countdown = seq.subscribe_countdown();

        assert!(seq.tick_countdown().await.is_none());
        assert!(seq.tick_countdown().await.is_none());
        assert_eq!(*countdown.borrow(), 1);
        assert!(seq.tick_countdown().await.is_none());

        assert_eq!(seq.log().turns()[0].answer, NO_ANSWER_PLACEHOLDER);
        assert_eq!(seq.status(), SessionStatus::Listening);
        assert_eq!(*seq.subscribe_question().borrow(), "Question 2");
        assert_eq!(*countdown.borrow(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_every_turn_and_reports() {
        let mut h = Harness::new(&["I think", "", "", "", ""]);
        h.config.answer_time = AnswerTimeLimit::new(3).expect("limit");
        let mut seq = h.sequencer();
        let (_tx, rx) = mpsc::channel(4);

        let report = match seq.run(None, rx).await.expect("run") {
            SessionOutcome::Reported(report) => report,
            other => panic!("expected report, got {other:?}"),
        };
        let answers: Vec<_> = report.log.turns().iter().map(|t| t.answer.as_str()).collect();
        assert_eq!(
            answers,
            [
                "I think (Time's up)",
                NO_ANSWER_PLACEHOLDER,
                NO_ANSWER_PLACEHOLDER,
                NO_ANSWER_PLACEHOLDER,
                NO_ANSWER_PLACEHOLDER
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_follows_commands_and_closed_channel_ends() {
        let mut h = Harness::new(&["one", "two"]);
        h.config.turn_limit = TurnLimit::new(5).expect("turns");
        let mut seq = h.sequencer();
        let (tx, rx) = mpsc::channel(4);
        tx.send(SessionCommand::NextQuestion).await.unwrap();
        drop(tx);

        let report = match seq.run(None, rx).await.expect("run") {
            SessionOutcome::Reported(report) => report,
            other => panic!("expected report, got {other:?}"),
        };
        let answers: Vec<_> = report.log.turns().iter().map(|t| t.answer.as_str()).collect();
        assert_eq!(answers, ["one", "two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_face_leaves_empty_series_while_faces_are_recorded() {
        let mut h = Harness::new(&["a", "b"]);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        seq.advance(AdvanceCause::NextRequested).await;
        assert!(seq.log().turns()[0].emotion_data.is_empty());

        let mut h = Harness::new(&["a"]);
        h.detector.face = Some(EmotionSnapshot {
            happy: 0.9,
            neutral: 0.1,
            ..Default::default()
        });
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        seq.advance(AdvanceCause::NextRequested).await;
        let series = &seq.log().turns()[0].emotion_data;
        assert!(series.len() >= 9, "got {} samples", series.len());
        assert!(series.iter().all(|s| s.happy > 0.8));
    }

    #[tokio::test(start_paused = true)]
    async fn live_channels_follow_the_current_turn() {
        let mut h = Harness::new(&["first", "second"]);
        h.detector.face = Some(EmotionSnapshot {
            surprised: 0.7,
            ..Default::default()
        });
        let mut seq = h.sequencer();
        let status = seq.subscribe_status();
        let transcript = seq.live_transcript();
        let emotion = seq.live_emotion();

        seq.start(None).await.expect("start");
        assert_eq!(*status.borrow(), SessionStatus::Listening);
        assert_eq!(*transcript.borrow(), "first");

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(emotion.borrow().surprised, 0.7);

        seq.advance(AdvanceCause::NextRequested).await;
        assert_eq!(*transcript.borrow(), "second");

        seq.end_interview().await;
        assert_eq!(*status.borrow(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_failure_reports_fallback_feedback() {
        let mut h = Harness::new(&["a1"]);
        h.evaluator = Arc::new(StubEvaluator {
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        let report = reported(seq.end_interview().await);

        assert_eq!(report.feedback, FeedbackScores::fallback());
        assert_eq!(report.log.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_failure_still_opens_capture() {
        let mut h = Harness::new(&["a1"]);
        h.tts.fail = true;
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");

        assert_eq!(seq.status(), SessionStatus::Listening);
        assert_eq!(*seq.subscribe_question().borrow(), "Question 1");
        assert_eq!(h.playback.played.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn question_failure_uses_fallback_question() {
        let mut h = Harness::new(&["a1"]);
        h.questions = Arc::new(StubQuestions {
            fail: true,
            requests: Mutex::new(Vec::new()),
        });
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        assert_eq!(*seq.subscribe_question().borrow(), FALLBACK_QUESTION);

        let report = reported(seq.end_interview().await);
        assert_eq!(report.log.turns()[0].question, FALLBACK_QUESTION);
    }

    #[tokio::test(start_paused = true)]
    async fn preconditions_reject_without_state_change() {
        let mut h = Harness::new(&[]);
        h.detector.camera = CameraState::Denied;
        let mut seq = h.sequencer();
        assert_eq!(seq.start(None).await, Err(SequencerError::CameraNotGranted));
        assert_eq!(seq.status(), SessionStatus::Idle);

        h.detector.loaded = false;
        let mut seq = h.sequencer();
        assert_eq!(seq.start(None).await, Err(SequencerError::DetectorNotLoaded));

        h.interview_type = InterviewType::Job;
        let mut seq = h.sequencer();
        assert_eq!(
            seq.start(Some("   ".to_owned())).await,
            Err(SequencerError::MissingJobContext)
        );
        assert!(h.questions.requests.lock().unwrap().is_empty());
        assert_eq!(seq.status(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn job_context_is_forwarded_and_second_start_rejected() {
        let mut h = Harness::new(&["a1"]);
        h.interview_type = InterviewType::Job;
        let mut seq = h.sequencer();
        seq.start(Some(" Backend engineer at Acme ".to_owned()))
            .await
            .expect("start");
        assert_eq!(seq.start(None).await, Err(SequencerError::NotIdle));
        assert_eq!(
            h.questions.requests.lock().unwrap()[0].context.as_deref(),
            Some("Backend engineer at Acme")
        );

        let mut h = Harness::new(&["a1"]);
        h.interview_type = InterviewType::School;
        let mut seq = h.sequencer();
        seq.start(Some("ignored".to_owned())).await.expect("start");
        assert!(h.questions.requests.lock().unwrap()[0].context.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn save_failure_still_returns_report_without_id() {
        let mut h = Harness::new(&["a1"]);
        h.store = Arc::new(FailingStore);
        let mut seq = h.sequencer();
        seq.start(None).await.expect("start");
        let report = reported(seq.end_interview().await);
        assert!(report.id.is_none());
        assert_eq!(report.log.len(), 1);
    }
}
