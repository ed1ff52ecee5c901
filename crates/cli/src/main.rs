use anyhow::Context;
use clap::{Parser, Subcommand};
use interview_coach_core::asr::LineRecognizer;
use interview_coach_core::config::{
    resolve_api_key, resolve_optional_string, AiPersonality, AiVoice, AnswerTimeLimit, Env,
    FirebaseConfig, GeminiConfig, InterviewType, InterviewerSettings, SessionConfig, StdEnv,
    TurnLimit, DEFAULT_ANSWER_SECS, DEFAULT_TURN_LIMIT, ENV_FIREBASE_API_KEY, ENV_FIREBASE_EMAIL,
    ENV_FIREBASE_PASSWORD, ENV_FIREBASE_PROJECT_ID, ENV_GEMINI_API_KEY,
};
use interview_coach_core::emotion::{FaceDetector, NoFaceDetector, ReplayFaceDetector};
use interview_coach_core::feedback::{emotion_distribution, GeminiEvaluator};
use interview_coach_core::genai::GeminiClient;
use interview_coach_core::playback::{NullPlaybackSink, PlaybackSink};
use interview_coach_core::question::GeminiQuestionGenerator;
use interview_coach_core::session::{
    Collaborators, SessionCommand, SessionOutcome, SessionReport, TurnSequencer,
};
use interview_coach_core::store::{
    AuthError, AuthSession, FirebaseAuth, FirestoreReportStore, MemoryReportStore, ReportStore,
    UserProfile,
};
use interview_coach_core::tts::GeminiTtsClient;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const DEFAULT_SETTINGS_FILE: &str = "interview-coach-settings.json";

#[derive(Parser, Debug)]
#[command(name = "interview-coach")]
#[command(about = "Mock interview practice with spoken questions and scored feedback")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(clap::Args, Debug)]
struct GlobalArgs {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true)]
    gemini_api_key: Option<String>,

    #[arg(long, global = true)]
    firebase_api_key: Option<String>,

    #[arg(long, global = true)]
    firebase_project_id: Option<String>,

    #[arg(long, global = true)]
    email: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    settings_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an interview. Type answers; `/next` moves on, `/end` finishes.
    Interview {
        #[arg(long = "type", default_value = "job")]
        interview_type: InterviewType,

        /// Role and company, required for job interviews.
        #[arg(long)]
        context: Option<String>,

        #[arg(long, default_value_t = DEFAULT_TURN_LIMIT)]
        turns: u32,

        #[arg(long, default_value_t = DEFAULT_ANSWER_SECS)]
        answer_secs: u64,

        /// JSON-lines expression trace to replay instead of a camera.
        #[arg(long)]
        emotion_trace: Option<PathBuf>,

        #[arg(long)]
        no_audio: bool,

        /// Output device name; the default device is used when unset or not found.
        #[arg(long)]
        output_device: Option<String>,

        /// Do not sign in; the report is printed but not stored.
        #[arg(long)]
        offline: bool,
    },
    /// List past interviews, newest first.
    History,
    ClearHistory,
    SignUp {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },
    /// Show or change the interviewer voice and personality.
    Settings {
        #[arg(long)]
        voice: Option<AiVoice>,

        #[arg(long)]
        personality: Option<AiPersonality>,
    },
}

struct Account {
    firebase: FirebaseConfig,
    email: String,
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.global.log_level)?;

    let env = StdEnv;
    let global = args.global;
    match args.command {
        Command::Interview {
            interview_type,
            context,
            turns,
            answer_secs,
            emotion_trace,
            no_audio,
            output_device,
            offline,
        } => {
            let session = session_config(turns, answer_secs)?;
            let options = InterviewOptions {
                interview_type,
                context,
                session,
                emotion_trace,
                no_audio,
                output_device,
                offline,
            };
            run_interview(&global, &env, options).await
        }
        Command::History => show_history(&global, &env).await,
        Command::ClearHistory => clear_history(&global, &env).await,
        Command::SignUp {
            first_name,
            last_name,
        } => sign_up(&global, &env, &first_name, &last_name).await,
        Command::Settings { voice, personality } => {
            update_settings(&global.settings_file, voice, personality)
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn session_config(turns: u32, answer_secs: u64) -> anyhow::Result<SessionConfig> {
    Ok(SessionConfig {
        turn_limit: TurnLimit::new(turns)?,
        answer_time: AnswerTimeLimit::new(answer_secs)?,
        ..Default::default()
    })
}

fn gemini_config(global: &GlobalArgs, env: &impl Env) -> anyhow::Result<GeminiConfig> {
    let key = resolve_api_key(global.gemini_api_key.clone(), ENV_GEMINI_API_KEY, env)?
        .with_context(|| format!("a Gemini API key is required (--gemini-api-key or {ENV_GEMINI_API_KEY})"))?;
    Ok(GeminiConfig::new(key))
}

fn account(global: &GlobalArgs, env: &impl Env) -> anyhow::Result<Account> {
    let api_key = resolve_api_key(global.firebase_api_key.clone(), ENV_FIREBASE_API_KEY, env)?
        .with_context(|| format!("--firebase-api-key or {ENV_FIREBASE_API_KEY} is required"))?;
    let project_id =
        resolve_optional_string(global.firebase_project_id.clone(), ENV_FIREBASE_PROJECT_ID, env)
            .with_context(|| {
                format!("--firebase-project-id or {ENV_FIREBASE_PROJECT_ID} is required")
            })?;
    let email = resolve_optional_string(global.email.clone(), ENV_FIREBASE_EMAIL, env)
        .with_context(|| format!("--email or {ENV_FIREBASE_EMAIL} is required"))?;
    let password = resolve_optional_string(global.password.clone(), ENV_FIREBASE_PASSWORD, env)
        .with_context(|| format!("--password or {ENV_FIREBASE_PASSWORD} is required"))?;
    Ok(Account {
        firebase: FirebaseConfig::new(api_key, project_id)?,
        email,
        password,
    })
}

async fn sign_in(account: &Account) -> anyhow::Result<AuthSession> {
    let session = FirebaseAuth::new(account.firebase.api_key.clone())
        .sign_in(&account.email, &account.password)
        .await
        .context("sign-in failed")?;
    tracing::info!(uid = %session.uid, "signed in");
    Ok(session)
}

async fn signed_in_store(
    global: &GlobalArgs,
    env: &impl Env,
) -> anyhow::Result<(FirestoreReportStore, AuthSession)> {
    let account = account(global, env)?;
    let session = sign_in(&account).await?;
    let store = FirestoreReportStore::new(&account.firebase, session.id_token.clone());
    Ok((store, session))
}

struct InterviewOptions {
    interview_type: InterviewType,
    context: Option<String>,
    session: SessionConfig,
    emotion_trace: Option<PathBuf>,
    no_audio: bool,
    output_device: Option<String>,
    offline: bool,
}

#[cfg(feature = "rodio")]
fn playback_sink(options: &InterviewOptions) -> Arc<dyn PlaybackSink> {
    use interview_coach_core::playback::AudioPlaybackSink;

    if options.no_audio {
        return Arc::new(NullPlaybackSink::new());
    }
    match options.output_device.as_deref() {
        Some(name) => Arc::new(AudioPlaybackSink::new().with_output_device_name(name)),
        None => Arc::new(AudioPlaybackSink::new()),
    }
}

#[cfg(not(feature = "rodio"))]
fn playback_sink(_options: &InterviewOptions) -> Arc<dyn PlaybackSink> {
    Arc::new(NullPlaybackSink::new())
}

async fn run_interview(
    global: &GlobalArgs,
    env: &impl Env,
    options: InterviewOptions,
) -> anyhow::Result<()> {
    let gemini = gemini_config(global, env)?;
    let client = GeminiClient::from_config(&gemini);
    let settings = InterviewerSettings::load(&global.settings_file);

    let detector: Arc<dyn FaceDetector> = match options.emotion_trace.as_deref() {
        Some(path) => Arc::new(
            ReplayFaceDetector::from_path(path)
                .with_context(|| format!("failed to load emotion trace {}", path.display()))?,
        ),
        None => Arc::new(NoFaceDetector::new()),
    };

    let (store, user_id): (Arc<dyn ReportStore>, Option<String>) = if options.offline {
        (Arc::new(MemoryReportStore::new()), None)
    } else {
        let (store, session) = signed_in_store(global, env).await?;
        (Arc::new(store), Some(session.uid))
    };

    let playback = playback_sink(&options);
    let recognizer = Arc::new(LineRecognizer::new());
    let mut sequencer = TurnSequencer::new(
        options.interview_type,
        settings,
        options.session,
        Collaborators {
            detector,
            recognizer: recognizer.clone(),
            questions: Arc::new(GeminiQuestionGenerator::new(
                client.clone(),
                gemini.text_model.clone(),
            )),
            tts: Arc::new(GeminiTtsClient::new(client.clone(), gemini.tts_model.clone())),
            playback,
            evaluator: Arc::new(GeminiEvaluator::new(client, gemini.text_model.clone())),
            store,
            user_id,
        },
    );

    let mut questions = sequencer.subscribe_question();
    tokio::spawn(async move {
        while questions.changed().await.is_ok() {
            let question = questions.borrow_and_update().clone();
            println!("\nInterviewer: {question}\n(type your answer; /next to move on, /end to finish)");
        }
    });

    let mut countdown = sequencer.subscribe_countdown();
    tokio::spawn(async move {
        while countdown.changed().await.is_ok() {
            let left = *countdown.borrow_and_update();
            if left == 30 || left == 10 {
                println!("({left}s left for this answer)");
            }
        }
    });

    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || read_answers(recognizer, tx));

    println!(
        "Starting a {} interview. Generating the first question...",
        options.interview_type
    );
    let outcome = sequencer.run(options.context, rx).await?;
    match outcome {
        SessionOutcome::Reported(report) => print_report(&report),
        SessionOutcome::Discarded => println!("Interview ended before any answer; nothing to report."),
    }
    Ok(())
}

/// Typed lines become the answer. EOF ends the interview by closing the channel.
///
/// Runs on a plain thread: a blocked stdin read must not hold up process exit.
fn read_answers(recognizer: Arc<LineRecognizer>, commands: mpsc::Sender<SessionCommand>) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed; ending interview");
                return;
            }
        };
        let command = match line.trim() {
            "/next" => SessionCommand::NextQuestion,
            "/end" => SessionCommand::EndInterview,
            _ => {
                if !recognizer.feed(&line) {
                    println!("(not listening yet; wait for the question)");
                }
                continue;
            }
        };
        let ending = command == SessionCommand::EndInterview;
        if commands.blocking_send(command).is_err() || ending {
            return;
        }
    }
}

fn print_report(report: &SessionReport) {
    let f = &report.feedback;
    println!("\n=== {} interview report ===", report.interview_type);
    if let Some(id) = report.id.as_deref() {
        println!("Saved as {id}");
    }
    println!(
        "Overall {:.1}/10  (clarity {:.1}, confidence {:.1}, answer quality {:.1}, engagement {:.1})",
        f.overall_score(),
        f.clarity,
        f.confidence,
        f.answer_quality,
        f.engagement
    );
    println!("\nStrengths:");
    for s in &f.strengths {
        println!("  - {s}");
    }
    println!("Areas for improvement:");
    for s in &f.areas_for_improvement {
        println!("  - {s}");
    }
    println!("\n{}", f.overall_feedback);

    let distribution = emotion_distribution(&report.log, 0.05);
    if !distribution.is_empty() {
        let parts: Vec<_> = distribution
            .iter()
            .map(|(e, v)| format!("{} {}%", e.as_str(), (v * 100.0).round() as i32))
            .collect();
        println!("\nExpressions: {}", parts.join(", "));
    }

    println!("\nTranscript:");
    for (i, turn) in report.log.turns().iter().enumerate() {
        println!("{}. Q: {}\n   A: {}", i + 1, turn.question, turn.answer);
    }
}

async fn show_history(global: &GlobalArgs, env: &impl Env) -> anyhow::Result<()> {
    let (store, session) = signed_in_store(global, env).await?;
    let reports = store
        .history(&session.uid)
        .await
        .context("failed to load interview history")?;
    if reports.is_empty() {
        println!("No interviews yet.");
        return Ok(());
    }
    for report in &reports {
        let when = report
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown date".to_owned());
        println!(
            "{when}  {:<7} {:>4.1}/10  {} turns  [{}]",
            report.interview_type.as_str(),
            report.feedback.overall_score(),
            report.log.len(),
            report.id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn clear_history(global: &GlobalArgs, env: &impl Env) -> anyhow::Result<()> {
    let (store, session) = signed_in_store(global, env).await?;
    let removed = store
        .clear(&session.uid)
        .await
        .context("failed to clear interview history")?;
    println!("Removed {removed} interview(s).");
    Ok(())
}

async fn sign_up(
    global: &GlobalArgs,
    env: &impl Env,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<()> {
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(AuthError::MissingName.into());
    }
    let account = account(global, env)?;
    let session = FirebaseAuth::new(account.firebase.api_key.clone())
        .sign_up(&account.email, &account.password)
        .await
        .context("sign-up failed")?;

    let store = FirestoreReportStore::new(&account.firebase, session.id_token.clone());
    let profile = UserProfile {
        first_name: first_name.trim().to_owned(),
        last_name: last_name.trim().to_owned(),
        email: session.email.clone(),
    };
    // The account exists at this point; a missing profile only loses the display name.
    if let Err(e) = store.create_user_profile(&session.uid, &profile).await {
        tracing::error!(error = %e, "failed to create user profile");
    }
    println!("Account created for {}.", session.email);
    Ok(())
}

fn update_settings(
    path: &Path,
    voice: Option<AiVoice>,
    personality: Option<AiPersonality>,
) -> anyhow::Result<()> {
    let mut settings = InterviewerSettings::load(path);
    if voice.is_some() || personality.is_some() {
        if let Some(v) = voice {
            settings.voice = v;
        }
        if let Some(p) = personality {
            settings.personality = p;
        }
        settings
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    println!(
        "voice: {}\npersonality: {}",
        settings.voice.as_str(),
        settings.personality.as_str()
    );
    Ok(())
}
