//! `coachloop run` — drive an agent session for a goal.

use super::App;
use coachloop_agent::AgentRun;
use coachloop_core::session::SessionStatus;

pub async fn run(goal: &str, user: &str, show_log: bool) -> anyhow::Result<()> {
    let app = App::init().await?;

    println!("▶ Running: {goal}");
    let run = app.controller.run(goal, user).await?;
    print_run(&run, show_log);
    Ok(())
}

pub(crate) fn print_run(run: &AgentRun, show_log: bool) {
    println!();
    match run.status {
        SessionStatus::Completed => {
            println!("✅ Completed in {} iteration(s)", run.iterations);
            if let Some(output) = &run.output {
                if let Some(summary) = output["summary"].as_str() {
                    println!("\n{summary}");
                }
                if !output["result"].is_null() {
                    println!(
                        "\n{}",
                        serde_json::to_string_pretty(&output["result"]).unwrap_or_default()
                    );
                }
            }
        }
        SessionStatus::NeedsClarification => {
            println!("❓ The agent needs clarification:");
            if let Some(question) = run
                .output
                .as_ref()
                .and_then(|o| o["question"].as_str())
            {
                println!("   {question}");
            }
        }
        SessionStatus::AwaitingApproval => {
            println!("⏸  Suspended — the agent wants approval for:");
            if let Some(plan) = &run.output {
                println!("{}", serde_json::to_string_pretty(plan).unwrap_or_default());
            }
            println!("\n  Approve:  coachloop resume {} --approve", run.session_id);
            println!("  Reject:   coachloop resume {} --reject", run.session_id);
        }
        SessionStatus::Timeout => {
            println!("⏱  Iteration limit reached — partial result:");
            if let Some(output) = &run.output {
                println!("{}", serde_json::to_string_pretty(output).unwrap_or_default());
            }
        }
        SessionStatus::Failed => {
            println!("❌ Session failed");
            if let Some(error) = run.output.as_ref().and_then(|o| o["error"].as_str()) {
                println!("   {error}");
            }
        }
        SessionStatus::Running => {
            // run() never returns a live session
            println!("Session {} is still running", run.session_id);
        }
    }

    if show_log {
        println!("\n── Phase log ──");
        for entry in &run.logs {
            println!(
                "[{:?}] iter {} — {}",
                entry.phase, entry.iteration, entry.detail
            );
        }
    }
}
