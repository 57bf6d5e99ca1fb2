//! `coachloop digest` — generate or fetch today's learning digest.

use super::App;
use coachloop_rag::DigestRequest;

pub async fn run(user: &str, force: bool, query: Option<String>) -> anyhow::Result<()> {
    let app = App::init().await?;

    let mut request = DigestRequest::for_user(user);
    request.force_refresh = force;
    request.explicit_query = query;

    let digest = app.digests.generate(request).await?;

    println!();
    println!("📚 Digest for {} — {}", digest.user_id, digest.digest_date);
    println!(
        "   quality: {:.2} ({})  insights: {}",
        digest.quality.average,
        digest.badge,
        digest.num_insights()
    );
    println!();

    if digest.insights.is_empty() {
        println!("No insights today.");
        if let Some(error) = digest.metadata["error"].as_str() {
            println!("  {error}");
        }
        println!("  Index more content and try again, or run with --force.");
        return Ok(());
    }

    for (i, insight) in digest.insights.iter().enumerate() {
        println!("{}. {}", i + 1, insight.title);
        println!("   {}", insight.explanation);
        println!("   → {}", insight.takeaway);
        if !insight.citations.is_empty() {
            println!("   sources: {}", insight.citations.join(", "));
        }
        println!();
    }

    Ok(())
}
