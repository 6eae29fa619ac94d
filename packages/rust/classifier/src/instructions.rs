//! Request builders for each classification operation.

use crate::ClassifyRequest;

const DOMAIN_PREAMBLE: &str = "You are an analyst of Vietnamese state budget estimates for \
recurrent expenditure (dự toán chi thường xuyên ngân sách nhà nước).";

/// Ask for a 1-10 score of how likely `name` is a concrete recurrent-expenditure task.
pub fn relevance_score(name: &str, max_output_tokens: u32) -> ClassifyRequest {
    let instruction = format!(
        "{DOMAIN_PREAMBLE}\n\
         Decide whether the given text is the name of one specific recurrent-expenditure task.\n\
         Names of localities, departments or units are not tasks. Totals, averages, \
         percentages and other aggregate lines are not tasks.\n\
         Answer with a single number from 1 to 10, where 1 means certainly not a specific \
         task and 10 means certainly a specific task."
    );
    ClassifyRequest {
        instruction,
        text: format!("Nội dung: \"{name}\""),
        max_output_tokens,
    }
}

/// Ask which budget classification codes apply to `name`.
///
/// `descriptions` are optional human-readable notes on the codes, paired by
/// position; missing entries are omitted.
pub fn category_codes(
    name: &str,
    codes: &[String],
    descriptions: &[String],
    max_output_tokens: u32,
) -> ClassifyRequest {
    let listing = codes
        .iter()
        .enumerate()
        .map(|(i, code)| match descriptions.get(i).filter(|d| !d.trim().is_empty()) {
            Some(desc) => format!("- {code}: {desc}"),
            None => format!("- {code}"),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let instruction = format!(
        "{DOMAIN_PREAMBLE}\n\
         Determine which budget classification codes (khoản) apply to the given task.\n\
         Candidate codes:\n{listing}\n\
         A task may belong to several codes. If only the sector is clear, list every code of \
         that sector. Answer only with the codes separated by commas, for example: 071, 072. \
         If no code can be determined, answer 'none'."
    );
    ClassifyRequest {
        instruction,
        text: format!("Nhiệm vụ: \"{name}\""),
        max_output_tokens,
    }
}

/// Ask which funding source finances `name`.
pub fn funding_source(name: &str, sources: &[String], max_output_tokens: u32) -> ClassifyRequest {
    let instruction = format!(
        "{DOMAIN_PREAMBLE}\n\
         Determine the funding source (nguồn) of the given task.\n\
         Candidate sources:\n{}\n\
         Answer with exactly one candidate, copied verbatim, and nothing else.",
        bullet_list(sources)
    );
    ClassifyRequest {
        instruction,
        text: format!("Nhiệm vụ: \"{name}\""),
        max_output_tokens,
    }
}

/// Ask which of the preceding `candidates` is the logical parent of `name`.
pub fn parent(name: &str, candidates: &[String], max_output_tokens: u32) -> ClassifyRequest {
    let instruction = format!(
        "{DOMAIN_PREAMBLE}\n\
         Budget tasks form an outline: a broad task groups the narrower tasks listed after it.\n\
         From the preceding tasks below, pick the one that is the direct parent of the given \
         task.\n\
         Preceding tasks:\n{}\n\
         Answer with the parent's name copied verbatim, or 'none' if no task is its parent.",
        bullet_list(candidates)
    );
    ClassifyRequest {
        instruction,
        text: format!("Nhiệm vụ: \"{name}\""),
        max_output_tokens,
    }
}

fn bullet_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("- {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}
