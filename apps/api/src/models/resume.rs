use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three resume formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Txt,
}

impl SourceFormat {
    /// Closed dispatch over upload extensions. `.doc` goes to the DOCX reader.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" | "doc" => Some(SourceFormat::Docx),
            "txt" => Some(SourceFormat::Txt),
            _ => None,
        }
    }
}

/// Raw text pulled out of an uploaded resume. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub text: String,
    pub format: SourceFormat,
}

/// Coarse user-facing control over how aggressively content is reworded.
/// Only changes prompt text; temperatures and control flow are unaffected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationLevel {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl OptimizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationLevel::Conservative => "Conservative",
            OptimizationLevel::Balanced => "Balanced",
            OptimizationLevel::Aggressive => "Aggressive",
        }
    }

    /// Instruction paragraph inserted into the full-resume prompt.
    pub fn directive(&self) -> String {
        let guidance = match self {
            OptimizationLevel::Conservative => {
                "keep the original wording wherever it already fits the role; \
                 only reorder content and swap in the job's terminology where it is an exact match"
            }
            OptimizationLevel::Balanced => {
                "reword bullets to foreground relevant achievements and adopt the job's terminology, \
                 while keeping the structure and voice of the original"
            }
            OptimizationLevel::Aggressive => {
                "substantially rewrite every section around the job's requirements, \
                 lead with the most relevant experience, and rephrase freely as long as every fact stays true"
            }
        };
        format!("{}: {}.", self.as_str(), guidance)
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(OptimizationLevel::Conservative),
            "balanced" | "" => Ok(OptimizationLevel::Balanced),
            "aggressive" => Ok(OptimizationLevel::Aggressive),
            other => Err(format!(
                "unknown optimization level '{other}' (expected Conservative, Balanced, or Aggressive)"
            )),
        }
    }
}

/// Named resume sections, declared in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// Anything before the first recognized header: name, contact line.
    Preamble,
    Summary,
    Experience,
    Skills,
    Education,
    Other,
}

impl SectionKind {
    pub fn slug(&self) -> &'static str {
        match self {
            SectionKind::Preamble => "preamble",
            SectionKind::Summary => "summary",
            SectionKind::Experience => "experience",
            SectionKind::Skills => "skills",
            SectionKind::Education => "education",
            SectionKind::Other => "other",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "preamble" => Some(SectionKind::Preamble),
            "summary" => Some(SectionKind::Summary),
            "experience" => Some(SectionKind::Experience),
            "skills" => Some(SectionKind::Skills),
            "education" => Some(SectionKind::Education),
            "other" => Some(SectionKind::Other),
            _ => None,
        }
    }

    /// Sections that get a dedicated rewrite call after the full-resume pass.
    pub fn is_refinement_target(&self) -> bool {
        matches!(self, SectionKind::Experience | SectionKind::Skills)
    }
}

/// One block of resume content under a single header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    /// Header text as it appeared in the source, without `#` markers.
    /// Empty for the preamble.
    pub heading: String,
    pub body: String,
}

/// A resume split into sections, always held in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedResume {
    sections: Vec<Section>,
}

impl GeneratedResume {
    /// Inserts a section at its canonical position. A kind that is already
    /// present keeps its first occurrence; the caller decides what to do
    /// with duplicates before getting here.
    pub fn insert(&mut self, section: Section) -> bool {
        match self.sections.binary_search_by(|s| s.kind.cmp(&section.kind)) {
            Ok(_) => false,
            Err(idx) => {
                self.sections.insert(idx, section);
                true
            }
        }
    }

    /// Swaps the body of an existing section. Returns false when absent.
    pub fn replace_body(&mut self, kind: SectionKind, body: String) -> bool {
        match self.sections.iter_mut().find(|s| s.kind == kind) {
            Some(section) => {
                section.body = body;
                true
            }
            None => false,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|s| s.kind).collect()
    }

    /// Takes a section out, e.g. to reopen it while splitting.
    pub fn remove(&mut self, kind: SectionKind) -> Option<Section> {
        let idx = self.sections.iter().position(|s| s.kind == kind)?;
        Some(self.sections.remove(idx))
    }
}

#[cfg(test)]
impl GeneratedResume {
    pub fn get(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}
