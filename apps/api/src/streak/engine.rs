//! Streak Engine: per-user consecutive-day completion counters.
//!
//! Streaks are never decremented by a timer. They decay lazily on read
//! (`get_streak`) and in the daily sweep (`reset_inactive_streaks`); both use
//! the same staleness rule: a positive streak whose last completion is
//! neither today nor yesterday resets to zero.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::clock::DayClock;
use crate::errors::AppError;
use crate::models::streak::UserStreakRow;

/// Fetches the user's streak record, creating a zeroed one on first access.
pub async fn get_or_create(pool: &PgPool, user_id: Uuid) -> Result<UserStreakRow, AppError> {
    if let Some(row) =
        sqlx::query_as::<_, UserStreakRow>("SELECT * FROM user_streaks WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
    {
        return Ok(row);
    }

    // ON CONFLICT guards two requests racing on first access.
    sqlx::query("INSERT INTO user_streaks (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(
        sqlx::query_as::<_, UserStreakRow>("SELECT * FROM user_streaks WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?,
    )
}

/// Registers a task completion for "today". A second completion on the same
/// calendar day is a no-op; a completion the day after the previous one
/// extends the streak; anything else starts a fresh one-day streak.
pub async fn register_completion(
    pool: &PgPool,
    clock: &DayClock,
    user_id: Uuid,
) -> Result<UserStreakRow, AppError> {
    let streak = get_or_create(pool, user_id).await?;
    let today = clock.today();

    let Some((current, start)) = advance_streak(
        streak.last_completion_date,
        streak.current_streak,
        streak.streak_start_date,
        today,
    ) else {
        return Ok(streak);
    };

    let longest = streak.longest_streak.max(current);

    let row = sqlx::query_as::<_, UserStreakRow>(
        r#"
        UPDATE user_streaks
        SET current_streak = $1,
            longest_streak = $2,
            total_completed_days = total_completed_days + 1,
            last_completion_date = $3,
            streak_start_date = $4
        WHERE user_id = $5
        RETURNING *
        "#,
    )
    .bind(current)
    .bind(longest)
    .bind(today)
    .bind(start)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    info!("Updated streak for user {user_id}: {current} days (longest: {longest})");
    Ok(row)
}

/// Returns the user's streak, persisting a lazy reset first when the streak
/// has gone stale.
pub async fn get_streak(
    pool: &PgPool,
    clock: &DayClock,
    user_id: Uuid,
) -> Result<UserStreakRow, AppError> {
    let streak = get_or_create(pool, user_id).await?;

    if streak.current_streak > 0 && is_stale(streak.last_completion_date, clock.today()) {
        let row = sqlx::query_as::<_, UserStreakRow>(
            r#"
            UPDATE user_streaks
            SET current_streak = 0, streak_start_date = NULL
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        return Ok(row);
    }

    Ok(streak)
}

#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub name: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_completed_days: i32,
}

/// Active streaks ranked by current length. Ties break deterministically on
/// longest streak, then user id.
pub async fn leaderboard(pool: &PgPool, limit: i64) -> Result<Vec<LeaderboardEntry>, AppError> {
    Ok(sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT us.user_id, u.name, us.current_streak, us.longest_streak, us.total_completed_days
        FROM user_streaks us
        JOIN app_users u ON u.id = us.user_id
        WHERE us.current_streak > 0
        ORDER BY us.current_streak DESC, us.longest_streak DESC, us.user_id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Rebuilds the streak record from the full completion history. This is the
/// repair path for drift between incremental updates and reality; it
/// overwrites all counters.
pub async fn resync_from_history(
    pool: &PgPool,
    clock: &DayClock,
    user_id: Uuid,
) -> Result<UserStreakRow, AppError> {
    get_or_create(pool, user_id).await?;

    let instants: Vec<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT completed_at FROM task_scores WHERE user_id = $1 AND is_completed",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut dates: Vec<NaiveDate> = instants
        .into_iter()
        .map(|(instant,)| clock.date_of(instant))
        .collect();
    dates.sort();
    dates.dedup();

    let today = clock.today();
    let (current, longest) = streak_runs(&dates, today);
    let last_completion = dates.last().copied();
    let streak_start = match (current, last_completion) {
        (c, Some(last)) if c > 0 => Some(last - Duration::days((c - 1) as i64)),
        _ => None,
    };

    let row = sqlx::query_as::<_, UserStreakRow>(
        r#"
        UPDATE user_streaks
        SET current_streak = $1,
            longest_streak = $2,
            total_completed_days = $3,
            last_completion_date = $4,
            streak_start_date = $5
        WHERE user_id = $6
        RETURNING *
        "#,
    )
    .bind(current)
    .bind(longest)
    .bind(dates.len() as i32)
    .bind(last_completion)
    .bind(streak_start)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    info!("Resynced streak for user {user_id} from {} completion days", dates.len());
    Ok(row)
}

/// Daily sweep: zero out every active streak whose last completion is older
/// than yesterday. Returns the number of streaks reset.
pub async fn reset_inactive_streaks(pool: &PgPool, clock: &DayClock) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE user_streaks
        SET current_streak = 0, streak_start_date = NULL
        WHERE current_streak > 0
          AND (last_completion_date IS NULL OR last_completion_date < $1)
        "#,
    )
    .bind(clock.yesterday())
    .execute(pool)
    .await?;

    let resets = result.rows_affected();
    if resets > 0 {
        info!("Reset {resets} inactive streaks");
    }
    Ok(resets)
}

/// Decides how a completion on `today` changes the counter.
/// `None` means the day is already counted; otherwise returns the new
/// (current_streak, streak_start_date).
fn advance_streak(
    last_completion: Option<NaiveDate>,
    current_streak: i32,
    streak_start: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<(i32, NaiveDate)> {
    if last_completion == Some(today) {
        return None;
    }
    if last_completion == Some(today - Duration::days(1)) {
        Some((current_streak.max(0) + 1, streak_start.unwrap_or(today)))
    } else {
        Some((1, today))
    }
}

fn is_stale(last_completion: Option<NaiveDate>, today: NaiveDate) -> bool {
    match last_completion {
        None => true,
        Some(date) => date != today && date != today - Duration::days(1),
    }
}

/// Given distinct completion dates sorted ascending, returns the current
/// streak (maximal consecutive run ending at the latest date, provided that
/// date is today or yesterday) and the longest run anywhere in history.
fn streak_runs(dates: &[NaiveDate], today: NaiveDate) -> (i32, i32) {
    let Some(&latest) = dates.last() else {
        return (0, 0);
    };

    let mut longest = 1;
    let mut run = 1;
    for pair in dates.windows(2) {
        if pair[1] - pair[0] == Duration::days(1) {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let current = if latest == today || latest == today - Duration::days(1) {
        run
    } else {
        0
    };

    (current, longest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_same_day_completion_is_a_no_op() {
        assert_eq!(advance_streak(Some(day(10)), 3, Some(day(8)), day(10)), None);
    }

    #[test]
    fn test_consecutive_day_extends_streak() {
        let advanced = advance_streak(Some(day(9)), 2, Some(day(8)), day(10));
        assert_eq!(advanced, Some((3, day(8))));
    }

    #[test]
    fn test_gap_resets_streak_to_one() {
        // last completion on D+2, next on D+5
        let advanced = advance_streak(Some(day(12)), 3, Some(day(10)), day(15));
        assert_eq!(advanced, Some((1, day(15))));
    }

    #[test]
    fn test_first_completion_starts_streak() {
        assert_eq!(advance_streak(None, 0, None, day(10)), Some((1, day(10))));
    }

    #[test]
    fn test_three_consecutive_days_reach_streak_of_three() {
        let mut current = 0;
        let mut last = None;
        let mut start = None;
        for d in [10, 11, 12] {
            if let Some((c, s)) = advance_streak(last, current, start, day(d)) {
                current = c;
                start = Some(s);
            }
            last = Some(day(d));
        }
        assert_eq!(current, 3);
        assert_eq!(start, Some(day(10)));
    }

    #[test]
    fn test_stale_when_last_completion_before_yesterday() {
        // last completion D+2, read at D+10
        assert!(is_stale(Some(day(12)), day(20)));
        assert!(is_stale(None, day(20)));
    }

    #[test]
    fn test_not_stale_today_or_yesterday() {
        assert!(!is_stale(Some(day(20)), day(20)));
        assert!(!is_stale(Some(day(19)), day(20)));
    }

    #[test]
    fn test_streak_runs_empty_history() {
        assert_eq!(streak_runs(&[], day(10)), (0, 0));
    }

    #[test]
    fn test_streak_runs_consecutive_ending_today() {
        let dates = [day(10), day(11), day(12)];
        assert_eq!(streak_runs(&dates, day(12)), (3, 3));
    }

    #[test]
    fn test_streak_runs_ending_yesterday_still_current() {
        let dates = [day(10), day(11)];
        assert_eq!(streak_runs(&dates, day(12)), (2, 2));
    }

    #[test]
    fn test_streak_runs_stale_tail_keeps_longest() {
        // 3-day run long ago, single recent-but-stale day
        let dates = [day(1), day(2), day(3), day(10)];
        let (current, longest) = streak_runs(&dates, day(20));
        assert_eq!(current, 0);
        assert_eq!(longest, 3);
    }

    #[test]
    fn test_streak_runs_gap_resets_current_run() {
        // runs: 10-11-12 then 15; today = 15
        let dates = [day(10), day(11), day(12), day(15)];
        let (current, longest) = streak_runs(&dates, day(15));
        assert_eq!(current, 1);
        assert_eq!(longest, 3);
    }
}
