use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Short,
    Long,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Short => "short",
            QuestionKind::Long => "long",
        }
    }
}

/// Which questionnaire a respondent is answering. The two sets share the
/// same id space (1..=10 short, 11..=13 long) so question_id stays the
/// sort/join key when responses are reconstructed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSet {
    Child,
    Parent,
}

#[derive(Serialize, Clone, Copy, Debug)]
pub struct Question {
    pub id: i32,
    pub text: &'static str,
    pub kind: QuestionKind,
}

const CHILD_SHORT: [Question; 10] = [
    Question { id: 1, text: "I feel comfortable being honest in our conversations.", kind: QuestionKind::Short },
    Question { id: 2, text: "We don't talk about the things that really matter.", kind: QuestionKind::Short },
    Question { id: 3, text: "I often feel misunderstood in our relationship.", kind: QuestionKind::Short },
    Question { id: 4, text: "I hold back from saying things because it's easier than explaining.", kind: QuestionKind::Short },
    Question { id: 5, text: "I sometimes feel judged when I speak honestly.", kind: QuestionKind::Short },
    Question { id: 6, text: "I'm not sure they truly understand what I'm going through.", kind: QuestionKind::Short },
    Question { id: 7, text: "I avoid certain topics because they usually lead to conflict.", kind: QuestionKind::Short },
    Question { id: 8, text: "We often talk, but don't really listen to each other.", kind: QuestionKind::Short },
    Question { id: 9, text: "Our connection feels more distant than it used to.", kind: QuestionKind::Short },
    Question { id: 10, text: "I think we both want a better relationship, but something blocks us.", kind: QuestionKind::Short },
];

const CHILD_LONG: [Question; 3] = [
    Question { id: 11, text: "What do you wish they understood about you?", kind: QuestionKind::Long },
    Question { id: 12, text: "What usually gets in the way when you try to connect or talk?", kind: QuestionKind::Long },
    Question { id: 13, text: "If your relationship could improve, what would you hope for?", kind: QuestionKind::Long },
];

const PARENT_SHORT: [Question; 10] = [
    Question { id: 1, text: "I feel my child trusts me with their problems.", kind: QuestionKind::Short },
    Question { id: 2, text: "My child and I communicate openly about important topics.", kind: QuestionKind::Short },
    Question { id: 3, text: "I understand what motivates my child.", kind: QuestionKind::Short },
    Question { id: 4, text: "My child seems comfortable sharing their feelings with me.", kind: QuestionKind::Short },
    Question { id: 5, text: "We rarely have arguments or conflicts.", kind: QuestionKind::Short },
    Question { id: 6, text: "I feel confident in my parenting approach with this child.", kind: QuestionKind::Short },
    Question { id: 7, text: "My child respects the boundaries I set.", kind: QuestionKind::Short },
    Question { id: 8, text: "I know what's going on in my child's life.", kind: QuestionKind::Short },
    Question { id: 9, text: "My child comes to me when they need help.", kind: QuestionKind::Short },
    Question { id: 10, text: "I feel emotionally connected to my child.", kind: QuestionKind::Short },
];

const PARENT_LONG: [Question; 3] = [
    Question { id: 11, text: "What do you wish your child understood about you as a parent?", kind: QuestionKind::Long },
    Question { id: 12, text: "What makes conversations with your child difficult, and how would you like them to improve?", kind: QuestionKind::Long },
    Question { id: 13, text: "Describe your hopes for your relationship with this child.", kind: QuestionKind::Long },
];

/// Answer choices offered for the child's short (agree/disagree) questions.
pub const CHILD_SHORT_OPTIONS: [&str; 3] = ["agree", "disagree", "neutral"];

/// Five-point scale offered for the parent's short questions.
pub const PARENT_SHORT_OPTIONS: [&str; 5] = [
    "Strongly Disagree",
    "Disagree",
    "Neutral",
    "Agree",
    "Strongly Agree",
];

pub fn short_questions(set: QuestionSet) -> &'static [Question] {
    match set {
        QuestionSet::Child => &CHILD_SHORT,
        QuestionSet::Parent => &PARENT_SHORT,
    }
}

pub fn long_questions(set: QuestionSet) -> &'static [Question] {
    match set {
        QuestionSet::Child => &CHILD_LONG,
        QuestionSet::Parent => &PARENT_LONG,
    }
}

/// All questions in display order: short answers first, then long, each
/// block in ascending id order.
pub fn all_questions(set: QuestionSet) -> Vec<Question> {
    let mut questions = Vec::with_capacity(question_count(set));
    questions.extend_from_slice(short_questions(set));
    questions.extend_from_slice(long_questions(set));
    questions
}

pub fn question_count(set: QuestionSet) -> usize {
    short_questions(set).len() + long_questions(set).len()
}

/// Short/long partition by id, shared by both sets: ids 1..=10 are short,
/// everything above is long-form.
pub fn kind_for_id(question_id: i32) -> QuestionKind {
    if question_id <= 10 {
        QuestionKind::Short
    } else {
        QuestionKind::Long
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_have_matching_shape() {
        for set in [QuestionSet::Child, QuestionSet::Parent] {
            assert_eq!(short_questions(set).len(), 10);
            assert_eq!(long_questions(set).len(), 3);
            assert_eq!(question_count(set), 13);
        }
    }

    #[test]
    fn ids_are_stable_and_ordered() {
        for set in [QuestionSet::Child, QuestionSet::Parent] {
            let all = all_questions(set);
            for (index, question) in all.iter().enumerate() {
                assert_eq!(question.id, index as i32 + 1);
                assert_eq!(question.kind, kind_for_id(question.id));
            }
        }
    }
}
