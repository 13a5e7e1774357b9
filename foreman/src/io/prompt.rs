//! Prompt builder for agent requests.
//!
//! Templates carry HTML-comment section markers; the builder parses them and
//! drops droppable sections (least important first) until the rendered prompt
//! fits the byte budget.

use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::graph::WorkItem;
use crate::io::run_store::ParentReviewTaskResult;

const TASK_TEMPLATE: &str = include_str!("prompts/task.md");
const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");

/// Selected item context for template rendering.
#[derive(Debug, Clone, Serialize)]
struct ItemContext {
    id: String,
    title: String,
    instructions: String,
    acceptance: Vec<String>,
}

impl ItemContext {
    fn from_item(item: &WorkItem) -> Self {
        let instructions = if item.prompt.trim().is_empty() {
            item.description.clone()
        } else {
            item.prompt.clone()
        };
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            instructions,
            acceptance: item.acceptance_criteria.clone(),
        }
    }
}

/// Inputs for a task-run prompt.
#[derive(Debug, Clone)]
pub struct TaskPromptInputs<'a> {
    pub item: &'a WorkItem,
    /// Prior context snapshot (previous run summary and the like).
    pub context: Option<String>,
    /// Human answers continuing a waiting_user session.
    pub answers: Vec<String>,
    /// Feedback injected by a decision or parent review.
    pub feedback: Option<String>,
    /// Bounded summary of the whole plan.
    pub graph_summary: String,
}

/// Inputs for a parent-review prompt.
#[derive(Debug, Clone)]
pub struct ReviewPromptInputs<'a> {
    pub parent: &'a WorkItem,
    pub results: &'a [ParentReviewTaskResult],
    pub graph_summary: String,
}

/// Builds prompts within a byte budget, dropping less critical sections
/// first.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    pub fn build_task(&self, inputs: &TaskPromptInputs<'_>) -> String {
        let mut env = Environment::new();
        env.add_template("task", TASK_TEMPLATE)
            .expect("task template should be valid");
        let template = env.get_template("task").expect("registered above");
        let rendered = template
            .render(context! {
                task => ItemContext::from_item(inputs.item),
                context => inputs.context.as_deref().map(str::trim).filter(|s| !s.is_empty()),
                answers => (!inputs.answers.is_empty()).then_some(&inputs.answers),
                feedback => inputs.feedback.as_deref().map(str::trim).filter(|s| !s.is_empty()),
                graph_summary => (!inputs.graph_summary.trim().is_empty())
                    .then(|| inputs.graph_summary.trim()),
            })
            .expect("task template rendering should not fail");
        self.assemble(&rendered)
    }

    pub fn build_review(&self, inputs: &ReviewPromptInputs<'_>) -> String {
        let mut env = Environment::new();
        env.add_template("review", REVIEW_TEMPLATE)
            .expect("review template should be valid");
        let template = env.get_template("review").expect("registered above");
        let rendered = template
            .render(context! {
                parent => ItemContext::from_item(inputs.parent),
                results => inputs.results,
                graph_summary => (!inputs.graph_summary.trim().is_empty())
                    .then(|| inputs.graph_summary.trim()),
            })
            .expect("review template rendering should not fail");
        self.assemble(&rendered)
    }

    fn assemble(&self, rendered: &str) -> String {
        let mut sections = parse_sections(rendered);
        apply_budget(&mut sections, self.budget_bytes);
        sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

/// Parse sections using `<!-- section:KEY required|droppable -->` markers.
fn parse_sections(rendered: &str) -> Vec<Section> {
    use std::sync::LazyLock;
    static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").unwrap()
    });

    let mut sections = Vec::new();
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();

    for (i, caps) in matches.iter().enumerate() {
        let key = caps.get(1).unwrap().as_str().to_string();
        let required = caps.get(2).unwrap().as_str() == "required";
        let start = caps.get(0).unwrap().end();
        let end = matches
            .get(i + 1)
            .map(|m| m.get(0).unwrap().start())
            .unwrap_or(rendered.len());

        let content = rendered[start..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(Section {
                key,
                required,
                content,
            });
        }
    }

    sections
}

/// Drop droppable sections, least critical first, until under budget;
/// truncate the last section as a final resort.
fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    let total_len = |secs: &[Section]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    let drop_order = ["graph", "context", "answers", "feedback"];
    for key in drop_order {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) > budget && !sections.is_empty() {
        let other_len: usize = sections
            .iter()
            .take(sections.len() - 1)
            .map(|s| s.content.len())
            .sum();
        let allowed = budget.saturating_sub(other_len);
        let last = sections.last_mut().unwrap();
        if last.content.len() > allowed {
            if allowed > 12 {
                last.content.truncate(allowed - 12);
                last.content.push_str("\n[truncated]");
            } else {
                last.content.truncate(allowed);
            }
            debug!(section = %last.key, "truncated section for budget");
        }
    }
}
