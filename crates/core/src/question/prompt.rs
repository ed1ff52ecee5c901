use crate::config::{AiPersonality, InterviewType};
use crate::question::QuestionRequest;

pub fn system_instruction(interview_type: InterviewType, personality: AiPersonality) -> String {
    let role = match interview_type {
        InterviewType::Job => {
            "You are a senior hiring manager conducting a professional job interview. \
             Ask relevant, role-specific questions. Start with an introductory question."
        }
        InterviewType::School => {
            "You are an admissions officer for a prestigious university. You are interviewing \
             a prospective student. Focus on academic achievements, personal growth, and future \
             aspirations. Start with a friendly ice-breaker."
        }
        InterviewType::Casual => {
            "You are a friendly stranger making small talk. Keep the conversation light, \
             engaging, and casual. Ask open-ended questions to get to know the person. \
             Start with a simple greeting."
        }
    };
    let tone = match personality {
        AiPersonality::Friendly => {
            "Your tone is warm and encouraging; put the candidate at ease."
        }
        AiPersonality::Professional => "Your tone is polite, neutral and professional.",
        AiPersonality::Strict => {
            "Your tone is demanding and direct; probe vague answers with pointed follow-ups."
        }
    };
    format!("{role} {tone}")
}

pub fn question_prompt(request: &QuestionRequest) -> String {
    let mut prompt = String::new();
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!(
            "The interview is for this role: \"{}\". Tailor your questions accordingly.\n",
            context.trim()
        ));
    }
    prompt.push_str(&format!(
        "Based on the interview type \"{}\" and the following conversation history, ask the next \
         logical and relevant interview question.\n\
         Do not repeat questions. Keep the questions concise.\n\
         If the history is empty, ask the first question.\n\nHistory:\n",
        request.interview_type
    ));
    let history = request
        .history
        .iter()
        .map(|turn| format!("Interviewer: {}\nCandidate: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n\n");
    prompt.push_str(&history);
    prompt.push_str("\n\nNext Question:");
    prompt
}
