//! Kubernetes namespace watch.
//!
//! Streams namespace events for environment namespaces (selected by
//! the environment-name label) and reduces them to add/update/delete
//! calls on the event handler. The watcher does not deliver the old
//! object on update, so a last-seen index keyed by namespace name
//! fills that in; the same index reconciles entries that disappeared
//! while the watch was restarting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::Api;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::ResourceExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::events::{EventHandler, NamespaceView, LABEL_ENV_NAME};

impl NamespaceView {
    fn from_namespace(ns: &Namespace) -> Self {
        Self {
            name: ns.name_any(),
            labels: ns.labels().clone(),
            annotations: ns.annotations().clone(),
            created_at: ns
                .creation_timestamp()
                .map(|time| time.0)
                .unwrap_or_default(),
        }
    }
}

/// Watch namespace events until shutdown.
///
/// `ready` is signalled once the initial listing completes so the HTTP
/// server starts with a populated store.
pub async fn watch_namespaces(
    client: kube::Client,
    handler: Arc<EventHandler>,
    ready: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let api: Api<Namespace> = Api::all(client);
    let config = watcher::Config::default().labels(LABEL_ENV_NAME);
    let stream = watcher::watcher(api, config).default_backoff();
    tokio::pin!(stream);

    // Namespaces observed in the current relist, used to synthesize
    // deletes for entries that vanished while the watch was down.
    let mut relisted: Option<HashSet<String>> = None;
    let mut last_seen: HashMap<String, NamespaceView> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("namespace watch shutting down");
                return Ok(());
            }
            event = stream.next() => {
                match event.context("namespace watch stream ended")? {
                    Err(err) => {
                        warn!(error = %err, "namespace watch error");
                    }
                    Ok(Event::Init) => {
                        relisted = Some(HashSet::new());
                    }
                    Ok(Event::InitApply(ns)) | Ok(Event::Apply(ns)) => {
                        let view = NamespaceView::from_namespace(&ns);
                        debug!(namespace = %view.name, labels = ?view.labels, "namespace applied");
                        if let Some(relisted) = relisted.as_mut() {
                            relisted.insert(view.name.clone());
                        }
                        match last_seen.insert(view.name.clone(), view.clone()) {
                            Some(old) => handler.handle_update(&old, &view).await,
                            None => handler.handle_add(&view).await,
                        }
                    }
                    Ok(Event::InitDone) => {
                        if let Some(relisted) = relisted.take() {
                            let gone: Vec<NamespaceView> = last_seen
                                .values()
                                .filter(|view| !relisted.contains(&view.name))
                                .cloned()
                                .collect();
                            for view in gone {
                                debug!(namespace = %view.name, "namespace vanished during relist");
                                last_seen.remove(&view.name);
                                handler.handle_delete(&view).await;
                            }
                        }
                        let _ = ready.send(true);
                    }
                    Ok(Event::Delete(ns)) => {
                        let view = NamespaceView::from_namespace(&ns);
                        debug!(namespace = %view.name, "namespace deleted");
                        last_seen.remove(&view.name);
                        handler.handle_delete(&view).await;
                    }
                }
            }
        }
    }
}
