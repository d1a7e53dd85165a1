//! Repository tests against a live PostgreSQL.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p database -- --ignored`.
//! Every test gets its own freshly migrated database.

use chrono::{Duration as ChronoDuration, NaiveDate};
use core_types::{CoreError, MarkPatch, MarkType, NewMark, Role, chain_is_consistent};
use database::repository::{
    LessonPatch, MarkFilter, NewGrade, NewJournal, NewLesson, NewUser, NewYear, UserPatch,
};
use database::{DbError, Models};
use sqlx::PgPool;
use std::time::Duration;

struct Fixture {
    models: Models,
    teacher: i64,
    student: i64,
    journal: i64,
    lesson: i64,
    grade_a: i64,
    grade_b: i64,
}

async fn user(models: &Models, name: &str, role: Role) -> i64 {
    models
        .users
        .insert(&NewUser {
            name: name.to_string(),
            email: format!("{}@school.test", name.to_lowercase()),
            password: "correct horse".to_string(),
            role,
            phone: None,
            address: None,
            birth_date: None,
        })
        .await
        .unwrap()
}

/// A year of three courses, one journal with the student enrolled and one lesson in course 1.
async fn fixture(pool: PgPool) -> Fixture {
    let models = Models::new(pool, Duration::from_secs(3));
    let teacher = user(&models, "Tess", Role::Teacher).await;
    let student = user(&models, "Sam", Role::Student).await;
    let year = models
        .years
        .insert(&NewYear { display_name: "2024/25".into(), courses: 3, current: true })
        .await
        .unwrap();
    let subject = models.subjects.insert("Maths").await.unwrap();
    let journal = models
        .journals
        .insert(&NewJournal {
            name: "Maths 1A".into(),
            teacher_id: teacher,
            subject_id: subject.id,
            year_id: year.id,
        })
        .await
        .unwrap();
    models.journals.add_student(journal, student).await.unwrap();
    let lesson = models
        .lessons
        .insert(&NewLesson {
            journal_id: journal,
            description: "Fractions".into(),
            date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            course: 1,
        })
        .await
        .unwrap();
    let grade_a = models
        .grades
        .insert(&NewGrade { identifier: "A".into(), value: 5 })
        .await
        .unwrap()
        .id;
    let grade_b = models
        .grades
        .insert(&NewGrade { identifier: "B".into(), value: 4 })
        .await
        .unwrap()
        .id;

    Fixture { models, teacher, student, journal, lesson: lesson.id, grade_a, grade_b }
}

fn lesson_mark(f: &Fixture, mark_type: MarkType, grade_id: Option<i64>) -> NewMark {
    NewMark {
        student_id: f.student,
        mark_type,
        lesson_id: Some(f.lesson),
        journal_id: None,
        course: None,
        subject_id: None,
        grade_id,
        comment: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn supersede_keeps_one_live_revision(pool: PgPool) {
    let f = fixture(pool).await;
    let marks = &f.models.marks;

    let m1 = marks
        .insert(&lesson_mark(&f, MarkType::LessonGrade, Some(f.grade_a)), f.teacher)
        .await
        .unwrap();
    assert!(m1.is_live());
    assert_eq!(m1.target.journal_id(), f.journal);
    assert_eq!(m1.target.course(), Some(1));

    let patch = MarkPatch { grade_id: Some(f.grade_b), ..Default::default() };
    let m2 = marks.supersede(m1.id, &patch, f.teacher).await.unwrap();
    assert_eq!(m2.previous_ids, vec![m1.id]);
    assert_eq!(m2.grade_id, Some(f.grade_b));
    assert!(!marks.get(m1.id).await.unwrap().current);

    let all = marks.list_by_student(f.student, MarkFilter::All).await.unwrap();
    assert_eq!(all.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m1.id, m2.id]);
    let live = marks.list_by_student(f.student, MarkFilter::Live).await.unwrap();
    assert_eq!(live.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m2.id]);
    assert!(chain_is_consistent(&all));

    let again = marks.supersede(m1.id, &patch, f.teacher).await;
    assert!(matches!(again, Err(DbError::Core(CoreError::MarkNotCurrent))));

    marks.delete(m2.id, f.teacher).await.unwrap();
    let deleted = marks.get(m2.id).await.unwrap();
    assert!(deleted.deleted && !deleted.current);
    let after_delete = marks.supersede(m2.id, &patch, f.teacher).await;
    assert!(matches!(after_delete, Err(DbError::Core(CoreError::MarkDeleted))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn insert_checks_target_membership_and_course(pool: PgPool) {
    let f = fixture(pool).await;
    let marks = &f.models.marks;

    let mut course_grade = NewMark {
        student_id: f.student,
        mark_type: MarkType::CourseGrade,
        lesson_id: None,
        journal_id: Some(f.journal),
        course: Some(4),
        subject_id: None,
        grade_id: Some(f.grade_a),
        comment: None,
    };
    let out_of_range = marks.insert(&course_grade, f.teacher).await;
    assert!(matches!(
        out_of_range,
        Err(DbError::Core(CoreError::CourseOutOfRange { course: 4, courses: 3 }))
    ));
    course_grade.course = Some(3);
    marks.insert(&course_grade, f.teacher).await.unwrap();

    let outsider = user(&f.models, "Olga", Role::Student).await;
    let mut foreign = lesson_mark(&f, MarkType::Late, None);
    foreign.student_id = outsider;
    assert!(matches!(
        marks.insert(&foreign, f.teacher).await,
        Err(DbError::UserNotInJournal)
    ));

    let mut not_student = lesson_mark(&f, MarkType::Late, None);
    not_student.student_id = f.teacher;
    assert!(matches!(
        marks.insert(&not_student, f.teacher).await,
        Err(DbError::NotAStudent)
    ));

    let journal = f.models.journals.get(f.journal).await.unwrap();
    assert_eq!(journal.courses, vec![1]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn one_excuse_per_absence(pool: PgPool) {
    let f = fixture(pool).await;
    let absence = f
        .models
        .marks
        .insert(&lesson_mark(&f, MarkType::Absent, None), f.teacher)
        .await
        .unwrap();
    let excuses = &f.models.excuses;

    let excuse = excuses.attach(f.student, absence.id, "doctor", f.teacher).await.unwrap();
    assert_eq!(excuse.mark_id, absence.id);
    assert!(matches!(
        excuses.attach(f.student, absence.id, "again", f.teacher).await,
        Err(DbError::AbsenceExcused)
    ));

    let listed = excuses.list_absences_with_excuses(f.student).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].excuse.as_ref().map(|e| e.id), Some(excuse.id));

    excuses.remove(f.student, excuse.id, f.teacher).await.unwrap();
    assert!(matches!(excuses.get(excuse.id).await, Err(DbError::NoSuchExcuse)));
    excuses.attach(f.student, absence.id, "dentist", f.teacher).await.unwrap();

    let late = f
        .models
        .marks
        .insert(&lesson_mark(&f, MarkType::Late, None), f.teacher)
        .await
        .unwrap();
    assert!(matches!(
        excuses.attach(f.student, late.id, "bus", f.teacher).await,
        Err(DbError::NotValidAbsence)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn stale_versions_conflict(pool: PgPool) {
    let f = fixture(pool).await;
    let lessons = &f.models.lessons;

    let first = LessonPatch { description: Some("Decimals".into()), ..Default::default() };
    let updated = lessons.update(f.lesson, first, 1).await.unwrap();
    assert_eq!(updated.version, 2);

    let second = LessonPatch { course: Some(2), ..Default::default() };
    assert!(matches!(
        lessons.update(f.lesson, second, 1).await,
        Err(DbError::EditConflict)
    ));

    let student = f.models.users.get(f.student).await.unwrap();
    let patch = UserPatch { name: Some("Samuel".into()), ..Default::default() };
    f.models.users.update(f.student, patch.clone(), student.version).await.unwrap();
    assert!(matches!(
        f.models.users.update(f.student, patch, student.version).await,
        Err(DbError::EditConflict)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn archived_journals_refuse_writes(pool: PgPool) {
    let f = fixture(pool).await;
    let patch = database::repository::JournalPatch { archived: Some(true), ..Default::default() };
    f.models.journals.update(f.journal, patch).await.unwrap();

    let lesson = NewLesson {
        journal_id: f.journal,
        description: "Late addition".into(),
        date: NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
        course: 1,
    };
    assert!(matches!(f.models.lessons.insert(&lesson).await, Err(DbError::JournalArchived)));
    assert!(matches!(
        f.models.journals.add_student(f.journal, f.student).await,
        Err(DbError::JournalArchived)
    ));
    assert!(matches!(
        f.models.marks.insert(&lesson_mark(&f, MarkType::Late, None), f.teacher).await,
        Err(DbError::JournalArchived)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn session_tokens_round_trip(pool: PgPool) {
    let f = fixture(pool).await;
    let sessions = &f.models.sessions;

    let user = f
        .models
        .users
        .verify_credentials("sam@school.test", "correct horse")
        .await
        .unwrap();
    let issued = sessions
        .create(user.id, "127.0.0.1", "test", ChronoDuration::hours(1))
        .await
        .unwrap();
    assert_eq!(issued.token.len(), 26);

    let (session, who) = sessions.authenticate(&issued.token).await.unwrap();
    assert_eq!(session.id, issued.session.id);
    assert_eq!(who.id, f.student);
    assert!(session.last_seen >= issued.session.last_seen);

    sessions.expire(session.id).await.unwrap();
    assert!(matches!(
        sessions.authenticate(&issued.token).await,
        Err(DbError::NoSuchSession)
    ));
    assert!(matches!(
        f.models.users.verify_credentials("sam@school.test", "wrong").await,
        Err(DbError::InvalidCredentials)
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn logs_paginate_with_total(pool: PgPool) {
    let f = fixture(pool).await;
    let logs = &f.models.logs;
    for i in 0..120 {
        let actor = if i % 2 == 0 { Some(f.teacher) } else { None };
        logs.record(actor, "update_user", &format!("user {i}")).await.unwrap();
    }

    let page = logs.list(None, 2, 50).await.unwrap();
    assert_eq!(page.logs.len(), 50);
    assert_eq!(page.total, 120);

    let by_actor = logs.list(Some("TESS"), 1, 50).await.unwrap();
    assert_eq!(by_actor.total, 60);
    let by_target = logs.list(Some("user 11"), 1, 50).await.unwrap();
    assert_eq!(by_target.total, 11, "user 11 and user 110..=119");

    let past_the_end = logs.list(None, 5, 50).await.unwrap();
    assert!(past_the_end.logs.is_empty());
    assert_eq!(past_the_end.total, 120);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn only_one_current_year(pool: PgPool) {
    let f = fixture(pool).await;
    let next = f
        .models
        .years
        .insert(&NewYear { display_name: "2025/26".into(), courses: 2, current: true })
        .await
        .unwrap();
    let current = f.models.years.get_current().await.unwrap();
    assert_eq!(current.id, next.id);
    let flagged = f.models.years.list().await.unwrap().iter().filter(|y| y.current).count();
    assert_eq!(flagged, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn journal_matrix_lists_every_member(pool: PgPool) {
    let f = fixture(pool).await;
    let other = user(&f.models, "Abel", Role::Student).await;
    f.models.journals.add_student(f.journal, other).await.unwrap();
    f.models
        .marks
        .insert(&lesson_mark(&f, MarkType::NotDone, None), f.teacher)
        .await
        .unwrap();

    let matrix = f.models.projections.journal_matrix(f.journal).await.unwrap();
    let names: Vec<&str> = matrix.iter().map(|row| row.student.name.as_str()).collect();
    assert_eq!(names, ["Abel", "Sam"]);
    assert!(matrix[0].marks.is_empty());
    assert_eq!(matrix[1].marks.len(), 1);

    let days = f.models.projections.latest_by_date(f.student, None, None).await.unwrap();
    assert!(!days.is_empty());
    assert_eq!(days[0].marks.len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn corrected_absences_keep_their_excuse(pool: PgPool) {
    let f = fixture(pool).await;
    let marks = &f.models.marks;
    let excuses = &f.models.excuses;

    let absence = marks
        .insert(&lesson_mark(&f, MarkType::Absent, None), f.teacher)
        .await
        .unwrap();
    let excuse = excuses.attach(f.student, absence.id, "doctor", f.teacher).await.unwrap();

    let comment = MarkPatch { comment: Some(Some("arrived at 10".into())), ..Default::default() };
    let corrected = marks.supersede(absence.id, &comment, f.teacher).await.unwrap();

    let listed = excuses.list_absences_with_excuses(f.student).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].mark.id, corrected.id);
    let carried = listed[0].excuse.as_ref().expect("excuse follows the live absence");
    assert_eq!(carried.id, excuse.id);
    assert_eq!(carried.mark_id, corrected.id);
    assert_eq!(carried.excuse, "doctor");

    let to_late = MarkPatch { mark_type: Some(MarkType::Late), ..Default::default() };
    marks.supersede(corrected.id, &to_late, f.teacher).await.unwrap();
    assert!(excuses.list_absences_with_excuses(f.student).await.unwrap().is_empty());
    assert!(matches!(excuses.get(excuse.id).await, Err(DbError::NoSuchExcuse)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a PostgreSQL server"]
async fn latest_windows_are_inclusive(pool: PgPool) {
    let f = fixture(pool).await;
    let day = |d| NaiveDate::from_ymd_opt(2024, 10, d).unwrap();
    for (date, description) in [(day(5), "Ratios"), (day(9), "Percentages"), (day(12), "Review")] {
        f.models
            .lessons
            .insert(&NewLesson {
                journal_id: f.journal,
                description: description.into(),
                date,
                course: 1,
            })
            .await
            .unwrap();
    }

    let dates = |lessons: Vec<database::repository::LessonDetail>| {
        lessons.into_iter().map(|l| l.lesson.date).collect::<Vec<_>>()
    };
    let lessons = &f.models.lessons;
    let window = lessons
        .list_latest_for_student(f.student, Some(day(5)), Some(day(9)))
        .await
        .unwrap();
    assert_eq!(dates(window), vec![day(9), day(5)]);
    let open_start = lessons.list_latest_for_student(f.student, None, Some(day(5))).await.unwrap();
    assert_eq!(dates(open_start), vec![day(5), day(1)]);
    let open_end = lessons.list_latest_for_student(f.student, Some(day(10)), None).await.unwrap();
    assert_eq!(dates(open_end), vec![day(12)]);

    let mark = f
        .models
        .marks
        .insert(&lesson_mark(&f, MarkType::Late, None), f.teacher)
        .await
        .unwrap();
    let today = mark.updated_at.date_naive();
    let yesterday = today.pred_opt().unwrap();
    let tomorrow = today.succ_opt().unwrap();
    let marks = &f.models.marks;

    let same_day = marks.latest(f.student, Some(today), Some(today)).await.unwrap();
    assert_eq!(same_day.iter().map(|m| m.id).collect::<Vec<_>>(), vec![mark.id]);
    assert!(marks.latest(f.student, None, Some(yesterday)).await.unwrap().is_empty());
    assert!(marks.latest(f.student, Some(tomorrow), None).await.unwrap().is_empty());

    let days = f
        .models
        .projections
        .latest_by_date(f.student, Some(day(9)), Some(day(12)))
        .await
        .unwrap();
    assert!(days.iter().all(|d| d.marks.is_empty()));
    assert_eq!(days.iter().map(|d| d.lessons.len()).sum::<usize>(), 2);
}
