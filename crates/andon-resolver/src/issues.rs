//! Issue operations: create, lifecycle updates, listings, and the
//! dashboard stats.

use andon_core::{
  Error, Result,
  caller::Caller,
  delta::Delta,
  issue::{Issue, IssueUpdate, NewIssue},
  store::{DeviceQuery, HierarchyStore, IssueStore, PrevDayStats, ReportQuery},
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{Resolver, Stash};

impl<S: HierarchyStore + IssueStore> Resolver<S> {
  /// Raise an issue. Open to every authenticated role.
  ///
  /// Applies the creation defaults (`status = open`, `version = 1`,
  /// `created_at = created`), stamps the caller as `created_by`, stores,
  /// publishes, and fans out the "opened" notification. There is no
  /// server-side dedup: callers that must not double-open check
  /// [`Resolver::find_open_issue`] first.
  pub async fn create_issue(
    &self,
    caller: &Caller,
    input: NewIssue,
  ) -> Result<Issue> {
    let issue = self
      .store
      .put_issue(input.into_issue(Some(caller.user_id.clone())))
      .await?;

    self.publish(Delta::IssueCreated(issue.clone()));
    self.notifier.issue_opened(&issue).await;
    Ok(issue)
  }

  /// Apply a lifecycle patch. Open to every authenticated role; the store
  /// enforces the version check and the transition graph in one
  /// transaction.
  pub async fn update_issue(
    &self,
    _caller: &Caller,
    update: IssueUpdate,
  ) -> Result<Issue> {
    let issue = self.store.update_issue(update).await?;
    self.publish(Delta::IssueUpdated(issue.clone()));
    Ok(issue)
  }

  pub async fn get_issue(&self, _caller: &Caller, id: Uuid) -> Result<Issue> {
    self.store.get_issue(id).await?.ok_or(Error::IssueNotFound(id))
  }

  /// The kiosk listing, post-filtered to the devices the caller may see.
  /// Issues carry device *names*, so the filter compares names.
  pub async fn issues_by_device(
    &self,
    caller: &Caller,
    query: DeviceQuery,
  ) -> Result<Vec<Issue>> {
    let stash = Stash::new(caller, "list issues by device");
    let scope = self.caller_scope(&stash).await?;
    let mut issues = self.store.issues_by_device(query).await?;
    issues.retain(|i| scope.allows_device_name(&i.device_name));
    Ok(issues)
  }

  /// The history/metrics listing. Reports span the whole site; the
  /// per-device scope does not apply here.
  pub async fn issues_by_site_area_status(
    &self,
    _caller: &Caller,
    query: ReportQuery,
  ) -> Result<Vec<Issue>> {
    self.store.issues_by_site_area_status(query).await
  }

  /// The most recent non-terminal issue for a device/event pair. Kiosk and
  /// ingest call this before raising to avoid double-opening.
  pub async fn find_open_issue(
    &self,
    _caller: &Caller,
    device_name: &str,
    event_id: Uuid,
  ) -> Result<Option<Issue>> {
    self.store.find_open_by_device_event(device_name, event_id).await
  }

  /// Dashboard stats: per-status counts over the trailing 24 hours and the
  /// trailing 3 hours, both ending at `now`.
  pub async fn prev_day_issue_stats(
    &self,
    _caller: &Caller,
    now: DateTime<Utc>,
  ) -> Result<PrevDayStats> {
    let last_24h = self
      .store
      .count_by_status_created_between(now - Duration::hours(24), now)
      .await?;
    let last_3h = self
      .store
      .count_by_status_created_between(now - Duration::hours(3), now)
      .await?;
    Ok(PrevDayStats { last_24h, last_3h })
  }
}
