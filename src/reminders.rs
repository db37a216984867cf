use anyhow::Result;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::calendar::Calendar;
use crate::db::Database;
use crate::models::{NormalizedJob, TrackedJob};

/// Open jobs whose deadline falls between `today` and `today + within_days`,
/// inclusive. Applied, offered and rejected jobs no longer need a reminder.
pub fn upcoming(jobs: &[TrackedJob], today: NaiveDate, within_days: i64) -> Vec<&TrackedJob> {
    jobs.iter()
        .filter(|t| t.job.status.is_open())
        .filter(|t| match &t.job.deadline {
            Some(deadline) => {
                let days_left = (deadline.date() - today).num_days();
                (0..=within_days).contains(&days_left)
            }
            None => false,
        })
        .collect()
}

pub fn reminder_title(job: &NormalizedJob) -> String {
    if job.role.is_empty() {
        format!("Apply: {}", job.company)
    } else {
        format!("Apply: {} @ {}", job.role, job.company)
    }
}

pub fn reminder_message(tracked: &TrackedJob, today: NaiveDate) -> String {
    let job = &tracked.job;
    let Some(deadline) = job.deadline else {
        return format!("#{} {}", tracked.id, reminder_title(job));
    };
    let due = deadline.date();
    let when = match (due - today).num_days() {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    };
    format!(
        "#{} {} is due {} ({}) {}",
        tracked.id,
        reminder_title(job),
        when,
        due.format("%Y-%m-%d"),
        job.apply_link
    )
}

pub fn notify<I: IntoIterator<Item = String>>(messages: I) {
    for message in messages {
        println!("[reminder] {}", message);
    }
}

#[derive(Debug, Default)]
pub struct ScheduleStats {
    pub scheduled: usize,
    pub already_scheduled: usize,
    pub errors: usize,
}

/// Put every upcoming deadline without a reminder on the calendar, and
/// remember the event so the next run does not schedule it twice.
pub fn schedule_reminders(
    db: &Database,
    calendar: &dyn Calendar,
    today: NaiveDate,
    within_days: i64,
) -> Result<ScheduleStats> {
    let jobs = db.jobs_with_deadlines()?;
    let mut stats = ScheduleStats::default();

    for tracked in upcoming(&jobs, today, within_days) {
        if tracked.reminder_event.is_some() {
            stats.already_scheduled += 1;
            continue;
        }
        let Some(deadline) = tracked.job.deadline else { continue };

        let title = reminder_title(&tracked.job);
        match calendar.schedule(&title, &deadline, Some(&tracked.job.apply_link)) {
            Ok(event) => {
                db.set_reminder_event(tracked.id, &event.id)?;
                info!(job = tracked.id, event = %event.id, "Scheduled deadline reminder");
                if let Some(link) = &event.link {
                    println!("Created calendar event for #{}: {}", tracked.id, link);
                }
                stats.scheduled += 1;
            }
            Err(e) => {
                warn!(job = tracked.id, error = %e, "Failed to schedule reminder");
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventHandle;
    use crate::models::{Deadline, SourceTag, Status};
    use crate::tracker::Tracker;
    use anyhow::anyhow;
    use chrono::Utc;
    use std::cell::RefCell;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn job(company: &str, deadline: Option<NaiveDate>, status: Status) -> NormalizedJob {
        NormalizedJob {
            company: company.to_string(),
            role: "SWE Intern".to_string(),
            location: String::new(),
            deadline: deadline.map(Deadline::On),
            apply_link: format!("https://{}.example/apply", company.to_lowercase()),
            source: SourceTag::Simplify,
            notes: String::new(),
            status,
            added_at: Utc::now(),
        }
    }

    fn tracked(id: i64, job: NormalizedJob) -> TrackedJob {
        TrackedJob {
            id,
            job,
            resume_file: None,
            cover_letter_file: None,
            reminder_event: None,
            updated_at: String::new(),
        }
    }

    #[derive(Default)]
    struct RecordingCalendar {
        titles: RefCell<Vec<String>>,
        fail_for: Option<String>,
    }

    impl Calendar for RecordingCalendar {
        fn schedule(&self, title: &str, _deadline: &Deadline, _url: Option<&str>) -> Result<EventHandle> {
            if self.fail_for.as_deref().is_some_and(|f| title.contains(f)) {
                return Err(anyhow!("calendar unavailable"));
            }
            self.titles.borrow_mut().push(title.to_string());
            Ok(EventHandle {
                id: format!("evt-{}", self.titles.borrow().len()),
                link: None,
            })
        }
    }

    #[test]
    fn test_upcoming_window_and_status() {
        let today = day(2025, 3, 1);
        let jobs = vec![
            tracked(1, job("Past", Some(day(2025, 2, 28)), Status::New)),
            tracked(2, job("Today", Some(day(2025, 3, 1)), Status::New)),
            tracked(3, job("Edge", Some(day(2025, 3, 8)), Status::Interested)),
            tracked(4, job("Later", Some(day(2025, 3, 9)), Status::New)),
            tracked(5, job("Applied", Some(day(2025, 3, 2)), Status::Applied)),
            tracked(6, job("None", None, Status::New)),
        ];
        let ids: Vec<i64> = upcoming(&jobs, today, 7).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_reminder_message() {
        let today = day(2025, 3, 1);
        let t = tracked(7, job("Acme", Some(day(2025, 3, 2)), Status::New));
        assert_eq!(
            reminder_message(&t, today),
            "#7 Apply: SWE Intern @ Acme is due tomorrow (2025-03-02) https://acme.example/apply"
        );
        let t = tracked(8, job("Acme", Some(day(2025, 3, 5)), Status::New));
        assert!(reminder_message(&t, today).contains("in 4 days"));
    }

    #[test]
    fn test_reminder_title_without_role() {
        let mut j = job("Acme", None, Status::New);
        j.role = String::new();
        assert_eq!(reminder_title(&j), "Apply: Acme");
    }

    #[test]
    fn test_schedule_reminders_once() {
        let db = Database::open_in_memory().unwrap();
        db.append(&job("Acme", Some(day(2025, 3, 3)), Status::New)).unwrap();
        db.append(&job("Globex", Some(day(2025, 3, 4)), Status::New)).unwrap();
        db.append(&job("Initech", Some(day(2025, 6, 1)), Status::New)).unwrap();

        let calendar = RecordingCalendar::default();
        let today = day(2025, 3, 1);
        let stats = schedule_reminders(&db, &calendar, today, 7).unwrap();
        assert_eq!(stats.scheduled, 2);
        assert_eq!(stats.errors, 0);

        let again = schedule_reminders(&db, &calendar, today, 7).unwrap();
        assert_eq!(again.scheduled, 0);
        assert_eq!(again.already_scheduled, 2);
        assert_eq!(calendar.titles.borrow().len(), 2);
    }

    #[test]
    fn test_schedule_failure_is_counted_and_retried_later() {
        let db = Database::open_in_memory().unwrap();
        db.append(&job("Acme", Some(day(2025, 3, 3)), Status::New)).unwrap();

        let broken = RecordingCalendar {
            fail_for: Some("Acme".to_string()),
            ..RecordingCalendar::default()
        };
        let stats = schedule_reminders(&db, &broken, day(2025, 3, 1), 7).unwrap();
        assert_eq!(stats.errors, 1);

        let working = RecordingCalendar::default();
        let stats = schedule_reminders(&db, &working, day(2025, 3, 1), 7).unwrap();
        assert_eq!(stats.scheduled, 1);
    }
}
