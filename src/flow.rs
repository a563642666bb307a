use thiserror::Error;

use crate::database::AssessmentResponses;
use crate::questions::{self, Question, QuestionKind, QuestionSet};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlowError {
    #[error("Answer the current question before moving on")]
    UnansweredQuestion,
    #[error("Questionnaire is not complete: {0} answers missing")]
    Incomplete(usize),
    #[error("A submission is already in flight")]
    SubmissionInFlight,
    #[error("Questionnaire is already finished")]
    AlreadyDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Answering(usize),
    Submitting,
    Done,
}

/// Drives one respondent through their question set:
/// `Answering(0) -> ... -> Answering(last) -> Submitting -> Done`.
/// "Next" requires a non-empty trimmed answer, "Previous" never validates,
/// and a submission in flight blocks a second one.
#[derive(Debug)]
pub struct QuestionnaireFlow {
    set: QuestionSet,
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    state: FlowState,
}

impl QuestionnaireFlow {
    pub fn new(set: QuestionSet) -> Self {
        let questions = questions::all_questions(set);
        let answers = vec![None; questions.len()];
        Self {
            set,
            questions,
            answers,
            state: FlowState::Answering(0),
        }
    }

    pub fn set(&self) -> QuestionSet {
        self.set
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            FlowState::Answering(index) => self.questions.get(index),
            _ => None,
        }
    }

    /// Answered share, 0..=100, for the progress bar.
    pub fn progress(&self) -> u8 {
        let answered = self.answers.iter().filter(|a| a.is_some()).count();
        ((answered * 100) / self.questions.len()) as u8
    }

    /// Record (or edit) the answer for the current question. Blank input
    /// clears it, which keeps "Next" gated.
    pub fn record_answer(&mut self, text: &str) -> Result<(), FlowError> {
        let FlowState::Answering(index) = self.state else {
            return Err(FlowError::AlreadyDone);
        };

        let trimmed = text.trim();
        self.answers[index] = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        Ok(())
    }

    pub fn next(&mut self) -> Result<(), FlowError> {
        let FlowState::Answering(index) = self.state else {
            return Err(FlowError::AlreadyDone);
        };

        if self.answers[index].is_none() {
            return Err(FlowError::UnansweredQuestion);
        }
        if index + 1 < self.questions.len() {
            self.state = FlowState::Answering(index + 1);
        }
        Ok(())
    }

    pub fn previous(&mut self) -> Result<(), FlowError> {
        let FlowState::Answering(index) = self.state else {
            return Err(FlowError::AlreadyDone);
        };

        if index > 0 {
            self.state = FlowState::Answering(index - 1);
        }
        Ok(())
    }

    /// Final "Complete" transition: every question must be answered. Moves
    /// to `Submitting` and hands back the partitioned answers for the
    /// aggregator; the flow stays locked until `finish` or `fail`.
    pub fn complete(&mut self) -> Result<AssessmentResponses, FlowError> {
        match self.state {
            FlowState::Answering(_) => {}
            FlowState::Submitting => return Err(FlowError::SubmissionInFlight),
            FlowState::Done => return Err(FlowError::AlreadyDone),
        }

        let missing = self.answers.iter().filter(|a| a.is_none()).count();
        if missing > 0 {
            return Err(FlowError::Incomplete(missing));
        }

        let mut responses = AssessmentResponses::default();
        for (question, answer) in self.questions.iter().zip(&self.answers) {
            let answer = answer.clone().unwrap_or_default();
            match question.kind {
                QuestionKind::Short => responses.short.push(answer),
                QuestionKind::Long => responses.long.push(answer),
            }
        }

        self.state = FlowState::Submitting;
        Ok(responses)
    }

    /// Submission succeeded.
    pub fn finish(&mut self) {
        if self.state == FlowState::Submitting {
            self.state = FlowState::Done;
        }
    }

    /// Submission failed; reopen on the last question so the user can
    /// retry.
    pub fn fail(&mut self) {
        if self.state == FlowState::Submitting {
            self.state = FlowState::Answering(self.questions.len() - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered_flow() -> QuestionnaireFlow {
        let mut flow = QuestionnaireFlow::new(QuestionSet::Child);
        for index in 0..13 {
            flow.record_answer(&format!("answer {}", index)).unwrap();
            flow.next().unwrap();
        }
        flow
    }

    #[test]
    fn next_requires_nonblank_answer() {
        let mut flow = QuestionnaireFlow::new(QuestionSet::Child);
        assert_eq!(flow.next(), Err(FlowError::UnansweredQuestion));

        flow.record_answer("   ").unwrap();
        assert_eq!(flow.next(), Err(FlowError::UnansweredQuestion));

        flow.record_answer("agree").unwrap();
        flow.next().unwrap();
        assert_eq!(flow.state(), FlowState::Answering(1));
    }

    #[test]
    fn previous_never_validates() {
        let mut flow = QuestionnaireFlow::new(QuestionSet::Parent);
        flow.record_answer("Agree").unwrap();
        flow.next().unwrap();

        flow.previous().unwrap();
        assert_eq!(flow.state(), FlowState::Answering(0));

        // At the first question, previous is a no-op.
        flow.previous().unwrap();
        assert_eq!(flow.state(), FlowState::Answering(0));
    }

    #[test]
    fn complete_rejects_partial_questionnaire() {
        let mut flow = QuestionnaireFlow::new(QuestionSet::Child);
        flow.record_answer("agree").unwrap();
        assert_eq!(flow.complete(), Err(FlowError::Incomplete(12)));
    }

    #[test]
    fn complete_partitions_in_question_order() {
        let mut flow = answered_flow();
        let responses = flow.complete().unwrap();

        assert_eq!(responses.short.len(), 10);
        assert_eq!(responses.long.len(), 3);
        assert_eq!(responses.short[0], "answer 0");
        assert_eq!(responses.long[0], "answer 10");
        assert_eq!(flow.state(), FlowState::Submitting);
    }

    #[test]
    fn no_double_submit_while_in_flight() {
        let mut flow = answered_flow();
        flow.complete().unwrap();
        assert_eq!(flow.complete(), Err(FlowError::SubmissionInFlight));
    }

    #[test]
    fn failed_submission_allows_retry() {
        let mut flow = answered_flow();
        flow.complete().unwrap();
        flow.fail();

        assert_eq!(flow.state(), FlowState::Answering(12));
        let responses = flow.complete().unwrap();
        assert_eq!(responses.short.len(), 10);

        flow.finish();
        assert_eq!(flow.state(), FlowState::Done);
        assert_eq!(flow.complete(), Err(FlowError::AlreadyDone));
    }

    #[test]
    fn progress_tracks_answered_questions() {
        let mut flow = QuestionnaireFlow::new(QuestionSet::Child);
        assert_eq!(flow.progress(), 0);

        flow.record_answer("agree").unwrap();
        assert_eq!(flow.progress(), 7); // 1/13

        let flow = answered_flow();
        assert_eq!(flow.progress(), 100);
    }
}
