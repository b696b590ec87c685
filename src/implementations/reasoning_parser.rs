use once_cell::sync::Lazy;
use regex::Regex;

pub const NO_FINAL_ANSWER: &str = "No clear final answer found";

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<think>(.*?)</think>").expect("think regex is valid")
});

static ANSWER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\\boxed\{([^}]+)\}",
        r"(?i)\\box\{([^}]+)\}",
        r"(?i)Answer:\s*([^\n]+)",
        r"(?i)Final answer:\s*([^\n]+)",
        r"(?i)Therefore,\s*([^\n]+)",
    ]
        .iter()
        .map(|p| Regex::new(p).expect("answer regex is valid"))
        .collect()
});

/// A reasoning model reply split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReasoning {
    pub internal_reasoning: String,
    pub worked_solution: String,
    pub final_answer: String,
}

/// Split a reasoning reply into thinking, worked solution and final answer
pub fn parse_reasoning_response(content: &str) -> ParsedReasoning {
    let internal_reasoning = THINK_BLOCK.captures(content)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();
    let worked_solution = THINK_BLOCK.replace_all(content, "").trim().to_string();
    let final_answer = extract_final_answer(&worked_solution);

    ParsedReasoning { internal_reasoning, worked_solution, final_answer }
}

pub fn extract_final_answer(solution: &str) -> String {
    if let Some(answer) = balanced_boxed(solution) {
        return answer;
    }

    for pattern in ANSWER_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(solution) {
            return captures[1].trim().to_string();
        }
    }

    solution
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| NO_FINAL_ANSWER.to_string())
}

/// Content of the first `\boxed{...}`, nested braces included
fn balanced_boxed(solution: &str) -> Option<String> {
    const OPEN: &str = "\\boxed{";

    let start = solution.find(OPEN)? + OPEN.len();
    let mut depth = 1usize;
    for (offset, ch) in solution[start..].char_indices() {
        match ch {
            '{' => {
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(solution[start..start + offset].trim().to_string());
                }
            }
            _ => {}
        }
    }
    None
}
