//! Prompts for the OCR and feedback calls.
//!
//! Every prompt lives here so that wording changes happen in one place and
//! unit tests can inspect them without a provider. Callers can override the
//! system prompts via [`crate::config::AnalyzerConfig::ocr_prompt`] and
//! [`crate::config::AnalyzerConfig::feedback_prompt`].

/// System prompt for transcribing the rendered resume page.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are a precise OCR engine. Transcribe every piece of text visible in the resume image.

Rules:
- Preserve the reading order a human would follow, section by section
- Keep names, dates, employers, job titles, degrees and skills exactly as written
- Keep bullet points as lines starting with "- "
- Do NOT summarise, rephrase, translate or correct the text
- Do NOT add commentary or explanations
- Output ONLY the transcribed plain text
- If the image contains no readable text, output nothing"#;

/// System prompt for the feedback call.
pub const FEEDBACK_SYSTEM_PROMPT: &str = r#"You are an expert in ATS (Applicant Tracking System) screening and resume review.
You assess resumes against a specific job and return structured, honest feedback.
Low scores are acceptable when the resume is weak; do not inflate them.
You always answer with a single JSON object and nothing else."#;

/// JSON shape the feedback must follow.
///
/// Each category carries a 0–100 score and a list of tips; `type` is either
/// `"good"` or `"improve"`.
pub const FEEDBACK_RESPONSE_FORMAT: &str = r#"{
  "overallScore": number,
  "ATS": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string }]
  },
  "toneAndStyle": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "content": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "structure": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "skills": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  }
}"#;

/// Build the user instructions for the feedback call.
///
/// The job context and the extracted resume text are embedded verbatim.
pub fn feedback_instructions(job_title: &str, job_description: &str, resume_text: &str) -> String {
    format!(
        "Analyze and rate this resume and suggest how to improve it for the job below.\n\
         Be thorough and detailed. Use the job title and description to judge fit.\n\
         \n\
         Job title: {job_title}\n\
         Job description: {job_description}\n\
         \n\
         Resume text:\n\
         ---\n\
         {resume_text}\n\
         ---\n\
         \n\
         Provide the feedback using the following format:\n\
         {FEEDBACK_RESPONSE_FORMAT}\n\
         \n\
         Return the analysis as a JSON object, without any other text and without backticks."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_prompt_forbids_commentary() {
        assert!(OCR_SYSTEM_PROMPT.contains("Do NOT add commentary"));
        assert!(OCR_SYSTEM_PROMPT.contains("plain text"));
    }

    #[test]
    fn feedback_prompt_requires_json() {
        assert!(FEEDBACK_SYSTEM_PROMPT.contains("JSON"));
    }

    #[test]
    fn instructions_embed_context_and_format() {
        let p = feedback_instructions("Backend Engineer", "Rust and Postgres", "Jane Doe\n- Rust");
        assert!(p.contains("Job title: Backend Engineer"));
        assert!(p.contains("Job description: Rust and Postgres"));
        assert!(p.contains("Jane Doe\n- Rust"));
        assert!(p.contains("\"overallScore\""));
        assert!(p.contains("without backticks"));
    }
}
