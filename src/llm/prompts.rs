//! LLM prompts for the holistic search-quality judge.

/// Collection of prompts used by the judge.
pub struct Prompts;

impl Prompts {
    /// Prompt asking the model to rate a candidate list against a reference list.
    ///
    /// Placeholders: `{query}`, `{reference}`, `{candidate}`.
    pub fn holistic_judge() -> &'static str {
        r#"You are an expert search quality rater evaluating point-of-interest (POI) search results.

User query: '{query}'

Reference results (ground truth from the trusted search engine):
{reference}

Candidate results (from the search engine under evaluation):
{candidate}

Evaluate the overall quality of the candidate results against the reference results for the user's query. Your score must reflect a user's satisfaction with the candidate results as a whole.

Evaluation steps:
1. Key Result Coverage: Does the candidate list contain the most important POI(s) from the reference list? Penalize heavily if the reference #1 result is highly relevant to the query but is completely missing from the candidate list.
2. Precision & Noise: How many of the candidate results are irrelevant or nonsensical for the query? A list with one good match and four bad matches is worse than a list with two good matches.
3. Ranking: If a strong match exists in the candidate list, where is it ranked? A high rank (e.g., #1 or #2) is much better than a low rank (e.g., #5).
4. Overall Judgment: Synthesize the above factors into a single score.

Scoring rubric:
- Score 0-1 (Useless): The candidate results are useless, completely irrelevant, or nonsensical.
- Score 2-4 (Very poor): The list is extremely noisy and contains at best a weakly relevant result ranked very low.
- Score 5-6 (Acceptable, but flawed): A relevant result is found, but it is poorly ranked and/or surrounded by significant noise.
- Score 7-8 (Good): The list contains a highly relevant result at a high rank with only a moderate amount of noise.
- Score 9-10 (Excellent): The results are highly relevant, well-ranked, and on par with the reference results.

Respond in JSON format:
{
    "score": <integer 0-10>,
    "judgment": "<Useless | Very poor | Acceptable | Good | Excellent>",
    "reasoning": "<brief explanation>"
}

Respond with only the JSON, no other text."#
    }

    /// Fill in [`Prompts::holistic_judge`].
    ///
    /// Placeholders are substituted in one pass over the template, so
    /// braces inside the inserted text are left alone.
    pub fn render_holistic_judge(query: &str, reference: &str, candidate: &str) -> String {
        let slots = [
            ("{query}", query),
            ("{reference}", reference),
            ("{candidate}", candidate),
        ];
        let template = Self::holistic_judge();
        let extra: usize = slots.iter().map(|(_, value)| value.len()).sum();
        let mut out = String::with_capacity(template.len() + extra);
        let mut rest = template;

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match slots.iter().find(|(name, _)| tail.starts_with(*name)) {
                Some((name, value)) => {
                    out.push_str(value);
                    rest = &tail[name.len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}
