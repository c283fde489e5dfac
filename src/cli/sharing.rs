//! Cross-agent sharing commands.

use anyhow::Result;

use hippocampus::config::HippocampusConfig;
use hippocampus::memory::sharing::{
    approve_share, get_shared, revoke_share, share_memory, sharing_stats, RevokeTarget,
    ShareDirection,
};

use super::{one_line, open_db, print_json};

pub fn share(
    config: &HippocampusConfig,
    memory_id: &str,
    with: &str,
    threshold: Option<f64>,
) -> Result<()> {
    let conn = open_db(config)?;
    let cfg = &config.sharing;
    let threshold = threshold.unwrap_or(cfg.threshold);
    match share_memory(&conn, memory_id, &cfg.agent_name, with, threshold, cfg)? {
        Some(id) => println!("Shared {memory_id} with {with} (share {id}, awaiting approval)"),
        None => println!("Refused: {memory_id} is too sensitive to share"),
    }
    Ok(())
}

pub fn approve(config: &HippocampusConfig, share_id: &str) -> Result<()> {
    let conn = open_db(config)?;
    if approve_share(&conn, share_id)? {
        println!("Approved share {share_id}");
    } else {
        println!("No active share with id {share_id}");
    }
    Ok(())
}

pub fn revoke(config: &HippocampusConfig, share_id: Option<&str>, memory_id: Option<&str>) -> Result<()> {
    let target = match (share_id, memory_id) {
        (Some(id), _) => RevokeTarget::Share(id.to_string()),
        (None, Some(id)) => RevokeTarget::Memory(id.to_string()),
        (None, None) => anyhow::bail!("pass either --share or --memory"),
    };
    let conn = open_db(config)?;
    let revoked = revoke_share(&conn, &target)?;
    println!("Revoked {revoked} share(s)");
    Ok(())
}

pub fn shared(
    config: &HippocampusConfig,
    agent: Option<&str>,
    direction: ShareDirection,
    json: bool,
) -> Result<()> {
    let conn = open_db(config)?;
    let entries = get_shared(&conn, agent, direction)?;
    if json {
        return print_json(&entries);
    }

    let stats = sharing_stats(&conn)?;
    println!(
        "{} active ({} pending approval), {} revoked\n",
        stats.active, stats.pending, stats.revoked
    );
    for e in &entries {
        println!(
            "  {} {} -> {}{}",
            e.share.id,
            e.share.shared_by,
            e.share.shared_with,
            if e.fully_consented { "" } else { " (pending)" }
        );
        println!("     {}", one_line(&e.content, 100));
    }
    Ok(())
}
