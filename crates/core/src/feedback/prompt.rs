use crate::config::InterviewType;
use crate::feedback::EvaluationRequest;

pub const EVALUATOR_SYSTEM_INSTRUCTION: &str = "You are an expert interview coach providing \
constructive feedback on both verbal and non-verbal communication.";

pub fn criteria_for(interview_type: InterviewType) -> &'static str {
    match interview_type {
        InterviewType::Job => {
            "Judge suitability for the role: relevant experience, concrete examples with \
             measurable outcomes, structured answers (situation, task, action, result), and \
             professional communication."
        }
        InterviewType::School => {
            "Judge readiness for admission: academic motivation, intellectual curiosity, \
             self-reflection on personal growth, and clarity about future aspirations."
        }
        InterviewType::Casual => {
            "Judge conversational skill: friendliness, active engagement with the other person, \
             open and relaxed answers, and keeping the conversation flowing."
        }
    }
}

pub fn evaluation_prompt(request: &EvaluationRequest) -> String {
    let mut prompt = String::from(
        "Analyze the following interview transcript and provide a comprehensive performance \
         evaluation.\n",
    );
    prompt.push_str(&format!("Interview Type: {}\n", request.interview_type));
    if let Some(context) = request.context.as_deref() {
        prompt.push_str(&format!(
            "The candidate was interviewing for this role: \"{context}\". Evaluate their answers \
             and performance based on suitability for this specific role.\n"
        ));
    }
    prompt.push_str(&format!("Evaluation criteria: {}\n\n", request.criteria));
    prompt.push_str(
        "For each turn, I will provide the candidate's answer and a summary of their non-verbal \
         cues derived from facial expression analysis.\n\
         Use this multi-modal information to provide a holistic analysis. A 'happy' or 'neutral' \
         expression generally indicates confidence and engagement, while excessive 'sad', \
         'angry', or 'fearful' expressions might suggest nervousness or a lack of confidence.\n\n\
         Transcript with Non-Verbal Analysis:\n",
    );
    let turns = request
        .turns
        .iter()
        .map(|t| {
            format!(
                "Interviewer: {}\nCandidate's Answer: {}\nCandidate's Non-Verbal Cues: {}",
                t.question, t.answer, t.non_verbal
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");
    prompt.push_str(&turns);
    prompt.push_str("\n\nBased on all of this, provide feedback in the required JSON format.");
    prompt
}
