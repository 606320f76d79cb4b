//! System instruction and per-page labels sent to the model.
//!
//! Callers can override the instruction via
//! [`crate::config::TranscriptionConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default system instruction for transcribing page images to text.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a pdf to text transformer. Your task is to output the content of the pdf in textual form. Don't summarize the text and return it as it is in the pdf. Images, tables, etc. should be in the exact form as they are in the pdf only using text. For images this means that you should describe the image in text. Make sure that the image description is within the text of the page where the image is located.";

/// Text segment placed before each page image, e.g. `"Page 3:"`.
pub fn page_label(page_num: usize) -> String {
    format!("Page {page_num}:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_one_indexed_page_number() {
        assert_eq!(page_label(1), "Page 1:");
        assert_eq!(page_label(12), "Page 12:");
    }

    #[test]
    fn default_prompt_asks_for_verbatim_text() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Don't summarize"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("describe the image"));
    }
}
