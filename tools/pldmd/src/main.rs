// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pldmd - PLDM platform management daemon.
//!
//! Wires the core onto a current-thread runtime: transport, requester
//! receive loop, terminus discovery, platform initialization, the event
//! pump, and the RDE manager with a log-backed sink. The publication
//! layer (D-Bus) attaches by replacing [`pldm::LogSink`] and feeding the
//! external signals into [`pldm::EventManager`] and [`pldm::RdeManager`].

use log::{error, info, warn};
use pldm::platform::termini_map;
use pldm::{
    Config, EventManager, InstanceIdDb, LogSink, PlatformManager, RdeManager, Requester,
    TerminusManager, TransportBackend,
};
use std::sync::Arc;

fn backend_from_env() -> TransportBackend {
    match std::env::var("PLDM_TRANSPORT").as_deref() {
        Ok("af-mctp") => TransportBackend::AfMctp,
        _ => TransportBackend::Demux,
    }
}

fn eids_from_env() -> Vec<u8> {
    std::env::var("PLDM_DISCOVER_EIDS")
        .ok()
        .map(|raw| {
            raw.split(',')
                .filter_map(|s| s.trim().parse::<u8>().ok())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> pldm::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("pldmd {} starting", pldm::VERSION);

    let cfg = Config::default();
    let transport = match pldm::transport::init(backend_from_env(), &cfg) {
        Ok(t) => t,
        Err(e) => {
            // No transport, no daemon.
            error!("transport init failed: {}", e);
            return Err(e);
        }
    };

    let iid_db = Arc::new(InstanceIdDb::new());
    let requester = Arc::new(Requester::new(transport, &cfg));
    let recv_loop = Arc::clone(&requester).start();

    let termini = termini_map();
    let terminus_mgr = Arc::new(TerminusManager::new(
        Arc::clone(&requester),
        Arc::clone(&iid_db),
        Arc::clone(&termini),
        &cfg,
    ));
    let platform_mgr = Arc::new(PlatformManager::new(
        Arc::clone(&requester),
        Arc::clone(&iid_db),
        Arc::clone(&termini),
        &cfg,
    ));
    let event_mgr = Arc::new(EventManager::new(
        Arc::clone(&requester),
        Arc::clone(&iid_db),
        &cfg,
    ));
    let sink = Arc::new(LogSink);
    let rde_mgr = Arc::new(RdeManager::new(
        Arc::clone(&requester),
        Arc::clone(&iid_db),
        &cfg,
        sink.clone(),
        sink,
    ));

    let pump = event_mgr.start_polling();

    // Static discovery list until an MCTP control-plane watcher feeds us.
    let eids = eids_from_env();
    if eids.is_empty() {
        warn!("no EIDs configured (set PLDM_DISCOVER_EIDS), idling");
    } else {
        let discovered = terminus_mgr.discover(&eids).await;
        info!("discovered {} termini", discovered.len());
        platform_mgr.init_termini().await?;

        // Hand RDE-capable termini to the session engine.
        let rde_candidates: Vec<(u8, u8, Vec<Vec<u8>>)> = {
            let map = termini.lock();
            map.values()
                .filter(|t| t.supports(pldm::protocol::TYPE_RDE))
                .map(|t| (t.eid, t.tid, t.redfish_resource_pdrs()))
                .collect()
        };
        for (eid, tid, payloads) in rde_candidates {
            let uuid = format!("device-{:02x}", eid);
            if let Err(e) = rde_mgr
                .handle_discovery_complete(eid, tid, &uuid, &payloads)
                .await
            {
                warn!("RDE discovery for EID {} failed: {}", eid, e);
            }
        }
    }

    // Run until the receive loop dies (transport failure) or the pump is
    // torn down externally.
    let _ = recv_loop.await;
    event_mgr.stop_polling();
    let _ = pump.await;
    Ok(())
}
