use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::Llm;
use crate::models::TrackedJob;

const HIGHLIGHT_COUNT: usize = 3;

pub const SYSTEM_PROMPT: &str = "You write concise, impact-oriented resume bullets using STAR framing. \
Optimize for ATS keywords and clarity.";

/// Ask the model to rewrite `base_bullets` for the role. Only lines the model
/// starts with `-` count as bullets.
pub fn tailor_resume_bullets(
    llm: &dyn Llm,
    role: &str,
    job_desc: &str,
    base_bullets: &[String],
) -> Result<Vec<String>> {
    let prompt = format!(
        "Role: {}\nJob Description:\n{}\n\nBase bullets:\n{}\n\n\
         Rewrite 4-5 bullets that best match the role. Keep each bullet under 25 words. \
         Use strong verbs and quantify impact.",
        role,
        job_desc,
        base_bullets.join("\n")
    );
    let response = llm.chat(Some(SYSTEM_PROMPT), &prompt)?;
    Ok(parse_bullets(&response))
}

fn parse_bullets(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('-'))
        .map(|line| line.trim_start_matches('-').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn cover_letter_draft(
    llm: &dyn Llm,
    company: &str,
    role: &str,
    job_desc: &str,
    highlights: &[String],
) -> Result<String> {
    let prompt = format!(
        "Write a 250-300 word cover letter for {} at {}. Weave in these highlights: {}. \
         Mirror the language of this job description: {} \
         Keep tone: enthusiastic, concrete, professional. No fluff.",
        role,
        company,
        highlights.join("; "),
        job_desc
    );
    Ok(llm.complete(&prompt)?.trim().to_string())
}

/// Base bullets from a text or markdown file, one per non-blank line.
pub fn read_bullets(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bullets from {}", path.display()))?;
    let bullets: Vec<String> = text
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if bullets.is_empty() {
        return Err(anyhow!("No bullets found in {}", path.display()));
    }
    Ok(bullets)
}

pub struct DraftedMaterials {
    pub resume_file: PathBuf,
    pub cover_letter_file: PathBuf,
    pub bullets: Vec<String>,
    pub cover_letter: String,
}

/// Generate both documents for a tracked job and write them to `out_dir` as
/// `<id>-resume.md` and `<id>-cover-letter.md`.
pub fn draft_for_job(
    llm: &dyn Llm,
    tracked: &TrackedJob,
    job_desc: &str,
    base_bullets: &[String],
    out_dir: &Path,
) -> Result<DraftedMaterials> {
    let job = &tracked.job;
    let bullets = tailor_resume_bullets(llm, &job.role, job_desc, base_bullets)?;
    let source: &[String] = if bullets.is_empty() { base_bullets } else { &bullets };
    let highlights = &source[..source.len().min(HIGHLIGHT_COUNT)];
    let cover_letter = cover_letter_draft(llm, &job.company, &job.role, job_desc, highlights)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let resume_file = out_dir.join(format!("{}-resume.md", tracked.id));
    let mut resume = format!("# {} @ {}\n\n", job.role, job.company);
    for bullet in &bullets {
        resume.push_str(&format!("- {}\n", bullet));
    }
    fs::write(&resume_file, resume)
        .with_context(|| format!("Failed to write {}", resume_file.display()))?;

    let cover_letter_file = out_dir.join(format!("{}-cover-letter.md", tracked.id));
    fs::write(&cover_letter_file, format!("{}\n", cover_letter))
        .with_context(|| format!("Failed to write {}", cover_letter_file.display()))?;

    Ok(DraftedMaterials {
        resume_file,
        cover_letter_file,
        bullets,
        cover_letter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::DraftProvider;
    use crate::models::{NormalizedJob, SourceTag, Status};
    use chrono::Utc;
    use std::cell::RefCell;

    struct ScriptedLlm {
        reply: String,
        prompts: RefCell<Vec<(Option<String>, String)>>,
    }

    impl ScriptedLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl Llm for ScriptedLlm {
        fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String> {
            self.prompts
                .borrow_mut()
                .push((system.map(str::to_string), prompt.to_string()));
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn tracked() -> TrackedJob {
        TrackedJob {
            id: 42,
            job: NormalizedJob {
                company: "Acme".to_string(),
                role: "SWE Intern".to_string(),
                location: "Remote".to_string(),
                deadline: None,
                apply_link: "https://acme.example/apply".to_string(),
                source: SourceTag::Simplify,
                notes: String::new(),
                status: Status::New,
                added_at: Utc::now(),
            },
            resume_file: None,
            cover_letter_file: None,
            reminder_event: None,
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_tailor_resume_bullets_keeps_dash_lines() {
        let llm = ScriptedLlm::new("Here you go:\n- Built a cache\n  - Cut latency 40%\n* not a bullet\n-\n");
        let bullets =
            tailor_resume_bullets(&llm, "SWE Intern", "Rust services", &["Wrote code".to_string()]).unwrap();
        assert_eq!(bullets, vec!["Built a cache", "Cut latency 40%"]);

        let prompts = llm.prompts.borrow();
        let (system, prompt) = &prompts[0];
        assert_eq!(system.as_deref(), Some(SYSTEM_PROMPT));
        assert!(prompt.starts_with("Role: SWE Intern\nJob Description:\nRust services"));
        assert!(prompt.contains("Base bullets:\nWrote code"));
        assert!(prompt.ends_with("quantify impact."));
    }

    #[test]
    fn test_cover_letter_prompt() {
        let llm = ScriptedLlm::new("  Dear team,\n\nI am excited.  \n");
        let letter = cover_letter_draft(
            &llm,
            "Acme",
            "SWE Intern",
            "We ship Rust.",
            &["Built a cache".to_string(), "Led a club".to_string()],
        )
        .unwrap();
        assert_eq!(letter, "Dear team,\n\nI am excited.");

        let prompts = llm.prompts.borrow();
        let (system, prompt) = &prompts[0];
        assert!(system.is_none());
        assert!(prompt.starts_with("Write a 250-300 word cover letter for SWE Intern at Acme."));
        assert!(prompt.contains("Built a cache; Led a club"));
        assert!(prompt.contains("We ship Rust."));
    }

    #[test]
    fn test_read_bullets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bullets.md");
        fs::write(&path, "- Built a cache\n\n* Led a club\nShipped a CLI\n").unwrap();
        assert_eq!(
            read_bullets(&path).unwrap(),
            vec!["Built a cache", "Led a club", "Shipped a CLI"]
        );

        fs::write(&path, "\n  \n").unwrap();
        assert!(read_bullets(&path).is_err());
    }

    #[test]
    fn test_draft_for_job_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("drafts");
        let llm = ScriptedLlm::new("- Built a cache\n- Shipped a CLI\n- Led a club\n- Won a hackathon");

        let drafted = draft_for_job(&llm, &tracked(), "Rust", &["Wrote code".to_string()], &out_dir).unwrap();
        assert_eq!(drafted.bullets.len(), 4);
        let prompts = llm.prompts.borrow();
        assert!(prompts[1].1.contains("Built a cache; Shipped a CLI; Led a club."));
        assert_eq!(drafted.resume_file, out_dir.join("42-resume.md"));
        assert_eq!(drafted.cover_letter_file, out_dir.join("42-cover-letter.md"));

        let resume = fs::read_to_string(&drafted.resume_file).unwrap();
        assert_eq!(
            resume,
            "# SWE Intern @ Acme\n\n- Built a cache\n- Shipped a CLI\n- Led a club\n- Won a hackathon\n"
        );
        assert!(drafted.cover_letter_file.exists());
    }

    #[test]
    fn test_draft_provider_output_has_no_bullets() {
        let dir = tempfile::tempdir().unwrap();
        let drafted =
            draft_for_job(&DraftProvider, &tracked(), "Rust", &["Wrote code".to_string()], dir.path()).unwrap();
        assert!(drafted.bullets.is_empty());
        assert!(drafted.cover_letter.starts_with("[DRAFT]"));
        assert!(drafted.cover_letter.contains("Wrote code"));
    }
}
