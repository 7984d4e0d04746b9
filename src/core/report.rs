use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::gemini::ProviderReply;
use crate::core::ingest::{ImageMetadata, UploadedImage};

pub const DISCLAIMER: &str = "DISCLAIMER: This AI-generated analysis is for educational and informational purposes only. \nIt should not be used as a substitute for professional medical advice, diagnosis, or treatment. \nAlways consult qualified healthcare professionals for medical decisions.";

const PREAMBLE_TITLE: &str = "Analysis";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Analysis,
    Findings,
    Recommendations,
    Treatment,
    Other,
}

impl SectionKind {
    pub fn classify(title: &str) -> Self {
        let title = title.to_lowercase();
        if title.contains("treatment") {
            SectionKind::Treatment
        } else if title.contains("recommend") || title.contains("next step") {
            SectionKind::Recommendations
        } else if title.contains("finding") || title.contains("observation") {
            SectionKind::Findings
        } else if title.contains("analysis") || title.contains("image type") {
            SectionKind::Analysis
        } else {
            SectionKind::Other
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub kind: SectionKind,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub image: ImageMetadata,
    pub sections: Vec<Section>,
    pub raw_text: String,
}

/// Returns the heading title if `line` is a markdown heading or a line that
/// is entirely bold text.
fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.starts_with('#') {
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        let rest = &trimmed[level..];
        if level <= 6 && (rest.is_empty() || rest.starts_with(' ')) {
            let title = clean_title(rest);
            return (!title.is_empty()).then_some(title);
        }
        return None;
    }

    if trimmed.len() > 4 && trimmed.starts_with("**") {
        let inner = trimmed.trim_end_matches(':');
        if let Some(inner) = inner.strip_prefix("**").and_then(|s| s.strip_suffix("**")) {
            if !inner.contains("**") {
                let title = clean_title(inner);
                return (!title.is_empty()).then_some(title);
            }
        }
    }

    None
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches('*')
        .trim_end_matches(':')
        .trim()
        .to_string()
}

/// Splits free text into titled sections. Text ahead of the first heading,
/// or the whole text when there are none, lands in an "Analysis" section.
pub fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title = PREAMBLE_TITLE.to_string();
    let mut body: Vec<&str> = Vec::new();

    let mut flush = |title: &str, body: &mut Vec<&str>| {
        let joined = body.join("\n").trim().to_string();
        body.clear();
        if !joined.is_empty() {
            sections.push(Section {
                kind: if title == PREAMBLE_TITLE {
                    SectionKind::Analysis
                } else {
                    SectionKind::classify(title)
                },
                title: title.to_string(),
                body: joined,
            });
        }
    };

    for line in text.lines() {
        match heading_title(line) {
            Some(next) => {
                flush(&title, &mut body);
                title = next;
            }
            None => body.push(line),
        }
    }
    flush(&title, &mut body);

    // headings with nothing under them still carry meaning when nothing else
    // survived
    if sections.is_empty() && !text.trim().is_empty() {
        sections.push(Section {
            title: PREAMBLE_TITLE.to_string(),
            kind: SectionKind::Analysis,
            body: text.trim().to_string(),
        });
    }

    sections
}

impl Report {
    pub fn from_reply(
        reply: ProviderReply,
        image: &UploadedImage,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sections: split_sections(&reply.text),
            model: reply.model,
            generated_at,
            image: image.metadata(),
            raw_text: reply.text,
        }
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn download_file_name(&self) -> String {
        format!(
            "medical_analysis_{}.txt",
            self.generated_at.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    pub fn render_text(&self) -> String {
        format!(
            "MEDICAL IMAGE ANALYSIS REPORT\nGenerated: {}\nImage: {}\nSize: {} × {} pixels\nModel: {}\n\n{}\n\n---\n{}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S"),
            self.image.file_name,
            self.image.width,
            self.image.height,
            self.model,
            self.raw_text.trim(),
            DISCLAIMER
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ingest::ingest;
    use crate::core::ingest::tests::encoded;
    use crate::utils::constants::MAX_IMAGE_BYTES;
    use chrono::TimeZone;
    use image::ImageFormat;

    const SAMPLE: &str = "Here is the report.\n\n## Detailed Analysis\nPA chest radiograph, good quality.\n\n## Findings Report\n- Clear lung fields\n- Normal cardiac silhouette\n\n**Recommendations and Next Steps:**\nClinical correlation advised.\n\n### Treatment suggestions\nNone required.\n";

    #[test]
    fn test_split_markdown_sections() {
        let sections = split_sections(SAMPLE);
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Analysis",
                "Detailed Analysis",
                "Findings Report",
                "Recommendations and Next Steps",
                "Treatment suggestions"
            ]
        );

        let kinds: Vec<SectionKind> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Analysis,
                SectionKind::Analysis,
                SectionKind::Findings,
                SectionKind::Recommendations,
                SectionKind::Treatment
            ]
        );
        assert_eq!(
            sections[2].body,
            "- Clear lung fields\n- Normal cardiac silhouette"
        );
    }

    #[test]
    fn test_plain_text_is_one_section() {
        let sections = split_sections("No headings at all, just prose.");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Analysis");
        assert_eq!(sections[0].kind, SectionKind::Analysis);
    }

    #[test]
    fn test_non_empty_text_always_has_a_section() {
        for text in ["x", "## Only A Heading", "# A\n# B", "**Bold Title**", "   \n text \n"] {
            assert!(!split_sections(text).is_empty(), "{text:?}");
        }
        assert!(split_sections("").is_empty());
        assert!(split_sections(" \n ").is_empty());
    }

    #[test]
    fn test_heading_detection() {
        assert_eq!(heading_title("## Findings"), Some("Findings".to_string()));
        assert_eq!(heading_title("**Findings:**"), Some("Findings".to_string()));
        assert_eq!(heading_title("**Findings**:"), Some("Findings".to_string()));
        assert_eq!(heading_title("#hashtag"), None);
        assert_eq!(heading_title("####### seven"), None);
        assert_eq!(heading_title("**bold** then text"), None);
        assert_eq!(heading_title("plain"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(SectionKind::classify("IMAGE TYPE & QUALITY"), SectionKind::Analysis);
        assert_eq!(SectionKind::classify("Observations"), SectionKind::Findings);
        assert_eq!(SectionKind::classify("Clinical Recommendations"), SectionKind::Recommendations);
        assert_eq!(SectionKind::classify("Treatment suggestions"), SectionKind::Treatment);
        assert_eq!(SectionKind::classify("Important Limitations"), SectionKind::Other);
    }

    #[test]
    fn test_render_download() {
        let image =
            ingest("knee.jpg", encoded(ImageFormat::Jpeg, 10, 20), MAX_IMAGE_BYTES).unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let report = Report::from_reply(
            ProviderReply {
                text: SAMPLE.to_string(),
                model: "gemini-1.5-flash".to_string(),
            },
            &image,
            generated_at,
        );

        assert_eq!(report.download_file_name(), "medical_analysis_2024-03-05_14-07-09.txt");
        assert!(report.section(SectionKind::Treatment).is_some());

        let text = report.render_text();
        assert!(
            text.starts_with("MEDICAL IMAGE ANALYSIS REPORT\nGenerated: 2024-03-05 14:07:09\n")
        );
        assert!(text.contains("Image: knee.jpg\nSize: 10 × 20 pixels"));
        assert!(text.contains("## Findings Report"));
        assert!(text.trim_end().ends_with("medical decisions."));
    }
}
