//! Turns the answers of a finished session into its one immutable result.

use std::collections::HashMap;

use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::collaborators::{ExamMetadata, QuestionKey};
use crate::core::state::AppState;
use crate::core::time::whole_minutes_between;
use crate::db::models::{ExamResult, ExamSession, SessionAnswer};
use crate::db::types::{Grade, PassingStatus, SessionStatus};
use crate::services::errors::SessionError;
use crate::store::AnswerGrade;

/// Lower bounds (inclusive) checked top-down.
const GRADE_BANDS: [(f64, Grade); 7] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::BPlus),
    (60.0, Grade::B),
    (50.0, Grade::CPlus),
    (40.0, Grade::C),
    (30.0, Grade::D),
];

pub(crate) fn percentage(obtained: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    f64::from(obtained) * 100.0 / f64::from(total)
}

pub(crate) fn grade_for_percentage(percentage: f64) -> Grade {
    GRADE_BANDS
        .iter()
        .find(|(lower, _)| percentage >= *lower)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

/// Sums question marks, ignoring negatives and saturating at `i32::MAX`.
pub(crate) fn sum_marks(marks: impl IntoIterator<Item = i32>) -> i32 {
    let total: i64 = marks.into_iter().map(|mark| i64::from(mark.max(0))).sum();
    i32::try_from(total).unwrap_or(i32::MAX)
}

/// Without configured passing marks the threshold is half the total, rounded up.
pub(crate) fn passing_status(obtained: i32, total: i32, passing_marks: Option<i32>) -> PassingStatus {
    let threshold = passing_marks.unwrap_or_else(|| (f64::from(total) * 0.5).ceil() as i32);
    if obtained >= threshold {
        PassingStatus::Pass
    } else {
        PassingStatus::Fail
    }
}

/// Everything grading consults besides the answers. `None` means the
/// collaborator could not be reached.
#[derive(Debug, Default)]
pub(crate) struct GradingContext {
    pub(crate) exam: Option<ExamMetadata>,
    pub(crate) exam_question_marks: Option<i32>,
    pub(crate) keys: HashMap<i64, QuestionKey>,
}

#[derive(Debug)]
pub(crate) struct Summary {
    pub(crate) grades: Vec<AnswerGrade>,
    pub(crate) correct_answers: i32,
    pub(crate) wrong_answers: i32,
    pub(crate) obtained_marks: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) grade: Grade,
    pub(crate) passing_status: PassingStatus,
}

fn grade_answer(answer: &SessionAnswer, key: Option<&QuestionKey>) -> AnswerGrade {
    let is_correct = key
        .and_then(|key| key.correct_answer.as_deref())
        .is_some_and(|correct| correct == answer.answer_text);
    let marks = key.and_then(|key| key.marks).unwrap_or(0).max(0);

    AnswerGrade {
        question_id: answer.question_id,
        is_correct,
        marks_obtained: if is_correct { marks } else { 0 },
    }
}

/// Pure aggregation of answers against the resolved answer keys.
pub(crate) fn summarize(answers: &[SessionAnswer], context: &GradingContext) -> Summary {
    let grades: Vec<AnswerGrade> = answers
        .iter()
        .map(|answer| grade_answer(answer, context.keys.get(&answer.question_id)))
        .collect();

    let correct_answers = grades.iter().filter(|grade| grade.is_correct).count() as i32;
    let wrong_answers = answers.len() as i32 - correct_answers;
    let obtained_marks = sum_marks(grades.iter().map(|grade| grade.marks_obtained));

    let resolved_marks = sum_marks(
        answers
            .iter()
            .filter_map(|answer| context.keys.get(&answer.question_id))
            .filter_map(|key| key.marks),
    );
    let total_marks = context
        .exam
        .as_ref()
        .and_then(|exam| exam.total_marks)
        .or(context.exam_question_marks)
        .unwrap_or(resolved_marks)
        .max(0);

    let percentage = percentage(obtained_marks, total_marks);
    let passing_marks = context.exam.as_ref().and_then(|exam| exam.passing_marks);

    Summary {
        grades,
        correct_answers,
        wrong_answers,
        obtained_marks,
        total_marks,
        percentage,
        grade: grade_for_percentage(percentage),
        passing_status: passing_status(obtained_marks, total_marks, passing_marks),
    }
}

/// Minutes between start and the moment the session stopped accepting answers.
pub(crate) fn time_taken_minutes(session: &ExamSession, now: PrimitiveDateTime) -> i32 {
    let Some(start) = session.start_time else {
        return 0;
    };
    let stop = match session.status {
        SessionStatus::TimedOut => session.end_time,
        SessionStatus::Submitted => session.submitted_time,
        _ => None,
    }
    .unwrap_or(now);
    whole_minutes_between(start, stop)
}

fn fallback(service: &'static str, session_id: &str, err: &dyn std::fmt::Display) {
    tracing::warn!(session_id, service, error = %err, "Collaborator unavailable; using fallback");
    metrics::counter!("collaborator_fallbacks_total", "service" => service).increment(1);
}

async fn resolve_context(
    state: &AppState,
    session: &ExamSession,
    answers: &[SessionAnswer],
) -> GradingContext {
    let collaborators = state.collaborators();
    let mut context = GradingContext::default();

    match collaborators.bounded("exam service", collaborators.exams.exam(session.exam_id)).await {
        Ok(exam) => context.exam = Some(exam),
        Err(err) => fallback("exam service", &session.id, &err),
    }

    for answer in answers {
        match collaborators
            .bounded("question service", collaborators.questions.question(answer.question_id))
            .await
        {
            Ok(key) => {
                context.keys.insert(answer.question_id, key);
            }
            Err(err) => fallback("question service", &session.id, &err),
        }
    }

    let exam_total = context.exam.as_ref().and_then(|exam| exam.total_marks);
    if exam_total.is_none() {
        match collaborators
            .bounded(
                "question service",
                collaborators.questions.questions_for_exam(session.exam_id),
            )
            .await
        {
            Ok(questions) => {
                context.exam_question_marks =
                    Some(sum_marks(questions.iter().filter_map(|q| q.marks)));
            }
            Err(err) => fallback("question service", &session.id, &err),
        }
    }

    context
}

/// Grades a SUBMITTED or TIMED_OUT session and persists its result.
/// Fails with `Conflict` when a result already exists.
pub(crate) async fn grade_session(
    state: &AppState,
    session: &ExamSession,
    now: PrimitiveDateTime,
) -> Result<ExamResult, SessionError> {
    let store = state.store();
    let answers = store.list_answers(&session.id).await?;
    let context = resolve_context(state, session, &answers).await;
    let summary = summarize(&answers, &context);

    store.record_answer_grades(&session.id, &summary.grades, now).await?;

    let result = ExamResult {
        id: Uuid::new_v4().to_string(),
        session_id: session.id.clone(),
        user_id: session.user_id,
        exam_id: session.exam_id,
        total_questions: session.total_questions,
        answered_questions: answers.len() as i32,
        correct_answers: summary.correct_answers,
        wrong_answers: summary.wrong_answers,
        total_marks: summary.total_marks,
        obtained_marks: summary.obtained_marks,
        percentage: summary.percentage,
        grade: summary.grade,
        time_taken_minutes: time_taken_minutes(session, now),
        passing_status: summary.passing_status,
        submitted_at: session.submitted_time.or(session.end_time).unwrap_or(now),
        created_at: now,
    };

    if !store.insert_result(&result).await? {
        return Err(SessionError::Conflict(format!(
            "session {} already has a result",
            session.id
        )));
    }

    tracing::info!(
        session_id = %session.id,
        exam_id = session.exam_id,
        user_id = session.user_id,
        obtained = result.obtained_marks,
        total = result.total_marks,
        grade = result.grade.label(),
        "Session graded"
    );
    metrics::counter!("results_graded_total").increment(1);

    Ok(result)
}

pub(crate) async fn result_for_session(
    state: &AppState,
    session_id: &str,
) -> Result<ExamResult, SessionError> {
    state
        .store()
        .find_result_by_session(session_id)
        .await?
        .ok_or_else(|| SessionError::NotFound(format!("result for session {session_id}")))
}

pub(crate) async fn results_by_user(
    state: &AppState,
    user_id: i64,
) -> Result<Vec<ExamResult>, SessionError> {
    Ok(state.store().list_results_by_user(user_id).await?)
}

pub(crate) async fn results_by_exam(
    state: &AppState,
    exam_id: i64,
) -> Result<Vec<ExamResult>, SessionError> {
    Ok(state.store().list_results_by_exam(exam_id).await?)
}

pub(crate) async fn result_for_user_exam(
    state: &AppState,
    user_id: i64,
    exam_id: i64,
) -> Result<ExamResult, SessionError> {
    state.store().find_result_for_user_exam(user_id, exam_id).await?.ok_or_else(|| {
        SessionError::NotFound(format!("result for user {user_id} and exam {exam_id}"))
    })
}

pub(crate) async fn is_exam_completed(
    state: &AppState,
    user_id: i64,
    exam_id: i64,
) -> Result<bool, SessionError> {
    Ok(state.store().find_result_for_user_exam(user_id, exam_id).await?.is_some())
}
