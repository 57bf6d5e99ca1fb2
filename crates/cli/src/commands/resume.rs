//! `coachloop resume` — resume a session waiting on approval.

use super::App;
use coachloop_core::session::{ApprovalDecision, SessionId};

pub async fn run(
    session_id: &str,
    approve: bool,
    reject: bool,
    reason: Option<String>,
) -> anyhow::Result<()> {
    let id: SessionId = session_id
        .parse()
        .map_err(|_| anyhow::anyhow!("'{session_id}' is not a valid session id"))?;

    let decision = match (approve, reject) {
        (true, false) => ApprovalDecision::Approved,
        (false, true) => ApprovalDecision::Rejected { reason },
        _ => anyhow::bail!("pass exactly one of --approve or --reject"),
    };

    let app = App::init().await?;
    let run = app.controller.resume(id, decision).await?;
    super::run::print_run(&run, false);
    Ok(())
}
