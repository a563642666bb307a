use crate::database::AssessmentResponses;

/// Fixed instruction template. Asks for exactly the six named fields in
/// JSON form and forbids echoing one party's literal words to the other.
pub const SYSTEM_PROMPT: &str = r#"You are an emotionally intelligent AI family relationship expert with decades of experience working with real families. Your responses should feel like they come from someone who has sat in countless living rooms, heard thousands of family conversations, and witnessed the beautiful mess of human relationships.

When analyzing responses, think like a therapist who knows that behind every answer is a real person with hopes, fears, and stories. Use the themes and feelings in their responses to create insights that feel personal and specific, but never quote or reveal one party's literal words to the other party.

Your analysis should include:
- Concrete moments or scenarios they can relate to
- Real, human language that sounds like caring advice from a wise friend
- Specific behavioral observations based on the patterns in their answers
- Practical suggestions tied to their unique situation

Provide a structured JSON response with exactly these fields:

{
  "childProfile": "A deeply personal analysis of the child's emotional world, communication style, and needs.",
  "parentProfile": "A compassionate analysis that honors the parent's perspective and their specific challenges and approaches.",
  "childQuestion": "A meaningful, specific question the child could ask their parent - one that feels natural for THIS child and would open real dialogue",
  "parentQuestion": "A thoughtful question the parent could ask THIS specific child - one that shows they want to understand their child's unique perspective",
  "childConclusion": "Specific, actionable advice that speaks directly to this child's situation, offering concrete next steps they can actually take",
  "parentConclusion": "Practical, empathetic guidance for this parent's specific situation, offering realistic strategies that honor both parent and child"
}

Return only valid JSON. Make every insight feel like it comes from someone who truly knows this family."#;

fn numbered(lines: &mut String, answers: &[String]) {
    for (index, answer) in answers.iter().enumerate() {
        lines.push_str(&format!("{}. {}\n", index + 1, answer));
    }
}

/// Deterministic user prompt: numbered listings (1-indexed, stored order)
/// of child short, child long, parent short, parent long answers.
pub fn build_user_prompt(
    parent_responses: &AssessmentResponses,
    child_responses: &AssessmentResponses,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("Child Assessment Responses:\n");
    prompt.push_str("Short answers:\n");
    numbered(&mut prompt, &child_responses.short);
    prompt.push_str("Long answers:\n");
    numbered(&mut prompt, &child_responses.long);

    prompt.push_str("\nParent Assessment Responses:\n");
    prompt.push_str("Short answers:\n");
    numbered(&mut prompt, &parent_responses.short);
    prompt.push_str("Long answers:\n");
    numbered(&mut prompt, &parent_responses.long);

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(short: &[&str], long: &[&str]) -> AssessmentResponses {
        AssessmentResponses {
            short: short.iter().map(|s| s.to_string()).collect(),
            long: long.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn prompt_is_numbered_and_ordered() {
        let parent = responses(&["Agree", "Disagree"], &["We need more time together."]);
        let child = responses(&["agree"], &["I wish they listened.", "Less arguing."]);

        let prompt = build_user_prompt(&parent, &child);

        let child_block = prompt.find("Child Assessment Responses:").unwrap();
        let parent_block = prompt.find("Parent Assessment Responses:").unwrap();
        assert!(child_block < parent_block);

        assert!(prompt.contains("1. agree\n"));
        assert!(prompt.contains("1. I wish they listened.\n2. Less arguing.\n"));
        assert!(prompt.contains("1. Agree\n2. Disagree\n"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let parent = responses(&["Neutral"], &["hope"]);
        let child = responses(&["disagree"], &["wish"]);
        assert_eq!(
            build_user_prompt(&parent, &child),
            build_user_prompt(&parent, &child)
        );
    }
}
