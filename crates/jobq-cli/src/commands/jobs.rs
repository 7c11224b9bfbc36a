//! Job commands: enqueue, list, show, dead-letter retry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use jobq_config::ConfigProvider;
use jobq_core::{JobState, NewJob};

use super::open_store;

pub async fn enqueue(
    db: &str,
    id: String,
    command: String,
    max_retries: Option<u32>,
) -> Result<()> {
    let settings = ConfigProvider::new().load()?;
    let store = open_store(db).await?;

    let mut new = NewJob::new(id, command);
    new.max_retries = max_retries;

    let job = store.enqueue(new, settings.default_max_retries).await?;
    println!("Enqueued job {} ({})", job.id, job.command);
    Ok(())
}

pub async fn list(db: &str, state: Option<String>, output: bool) -> Result<()> {
    let state = state.map(|s| s.parse::<JobState>()).transpose()?;
    let store = open_store(db).await?;
    let jobs = store.list(state).await?;

    match state {
        Some(state) => println!("Jobs ({state}):"),
        None => println!("Jobs (all):"),
    }
    if jobs.is_empty() {
        println!("  none");
        return Ok(());
    }

    if output {
        println!(
            "{:<16} {:<28} {:<10} {:>8}  {:<28} {}",
            "ID", "COMMAND", "STATE", "ATTEMPTS", "STDOUT", "STDERR"
        );
        for job in &jobs {
            println!(
                "{:<16} {:<28} {:<10} {:>8}  {:<28} {}",
                truncate(&job.id, 16),
                truncate(&job.command, 28),
                job.state,
                format!("{}/{}", job.attempts, job.max_retries),
                preview(job.stdout.as_deref()),
                preview(job.stderr.as_deref()),
            );
        }
    } else {
        println!(
            "{:<16} {:<28} {:<10} {:>8}  {:<20} {}",
            "ID", "COMMAND", "STATE", "ATTEMPTS", "NEXT RUN", "LAST ERROR"
        );
        for job in &jobs {
            println!(
                "{:<16} {:<28} {:<10} {:>8}  {:<20} {}",
                truncate(&job.id, 16),
                truncate(&job.command, 28),
                job.state,
                format!("{}/{}", job.attempts, job.max_retries),
                format_next_run(job.next_run),
                preview(job.last_error.as_deref()),
            );
        }
    }
    Ok(())
}

pub async fn show(db: &str, id: &str) -> Result<()> {
    let store = open_store(db).await?;
    let job = store.get(id).await?;

    println!("ID:         {}", job.id);
    println!("Command:    {}", job.command);
    println!("State:      {}", job.state);
    println!("Attempts:   {}/{}", job.attempts, job.max_retries);
    println!("Next run:   {}", format_next_run(job.next_run));
    if let Some(claimed_by) = &job.claimed_by {
        println!("Claimed by: {claimed_by}");
    }
    println!("Created:    {}", job.created_at.to_rfc3339());
    println!("Updated:    {}", job.updated_at.to_rfc3339());

    if let Some(last_error) = &job.last_error {
        println!("\n--- Last error ---\n{last_error}");
    }
    if let Some(stdout) = &job.stdout {
        println!("\n--- Stdout ---\n{stdout}");
    }
    if let Some(stderr) = &job.stderr {
        println!("\n--- Stderr ---\n{stderr}");
    }
    Ok(())
}

pub async fn retry_dead(db: &str, id: &str) -> Result<()> {
    let store = open_store(db).await?;
    let job = store.requeue_dead(id).await?;
    println!("Job {} requeued as pending", job.id);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn preview(s: Option<&str>) -> String {
    match s {
        Some(s) => truncate(s.trim_end().lines().next().unwrap_or(""), 40),
        None => "-".to_string(),
    }
}

fn format_next_run(next_run: Option<DateTime<Utc>>) -> String {
    match next_run {
        Some(t) if t.timestamp_millis() == 0 => "now".to_string(),
        Some(t) => t.to_rfc3339(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_keeps_short_strings() {
        assert_eq!(truncate("short", 16), "short");
        assert_eq!(truncate("exactly-sixteen!", 16), "exactly-sixteen!");
    }

    #[test]
    fn test_truncate_marks_long_strings() {
        let t = truncate("a-rather-long-job-identifier", 16);
        assert_eq!(t.chars().count(), 16);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn test_preview_takes_first_line() {
        assert_eq!(preview(Some("line one\nline two")), "line one");
        assert_eq!(preview(None), "-");
    }

    #[test]
    fn test_format_next_run() {
        assert_eq!(format_next_run(None), "-");
        assert_eq!(
            format_next_run(Some(Utc.timestamp_millis_opt(0).unwrap())),
            "now"
        );
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(format_next_run(Some(t)), t.to_rfc3339());
    }
}
