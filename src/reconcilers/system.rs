// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! System reconciliation.
//!
//! The System is the root of a namespace. Its reconciler builds the
//! namespace's platform client, applies the system-wide settings and, after
//! the first successful pass, marks the namespace ready so that every other
//! reconciler may proceed.
//!
//! Settings are applied in a fixed order: attributes, certificates, license,
//! DRBD, DNS, NTP, PTP, service parameters, storage backends and finally
//! controller filesystems. Each step can be disabled on its own through the
//! reconciler configuration.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use x509_parser::prelude::{FromDer, X509Certificate};

use super::finalizers::is_deleting;
use super::lifecycle::{check_after_in_sync, prepare, Change, Preamble};
use super::status::{is_principal, is_reconciled, patch_status, record_delta, reload, sync_status};
use crate::config::{ReconcilerConfig, ReconcilerName};
use crate::constants::{
    HTTP_PREFIX, NO_CONTENT, RESYNC_INTERVAL, SECRET_CERT_KEY, SECRET_LICENSE_CONTENT_KEY,
    SECRET_PRIVATE_KEY_KEY, STRATEGY_UNLOCK_REQUIRED, SYSTEM_ENDPOINT_NAME, SYSTEM_ENDPOINT_TYPE,
};
use crate::context::Context;
use crate::crd::{
    ControllerFileSystemInfo, DrbdConfiguration, PtpInfo, ServiceParameterInfo, StorageBackend,
    System, SystemSpec, SystemStorageInfo,
};
use crate::delta::delta_string;
use crate::errors::{PlatformError, ReconcileError, StoreError};
use crate::events::reasons;
use crate::manager::{monitors, strategy, SYSTEM_MODE_SIMPLEX};
use crate::merge::MergeTransformer;
use crate::metrics;
use crate::platform::inventory::hosts::{self, controllers_available};
use crate::platform::inventory::system::{
    self as inventory, Certificate, ControllerFileSystem, Dns, Drbd, License, Ntp, Ptp,
    ServiceParameter, StorageBackend as PlatformStorageBackend, System as PlatformSystem,
    FS_RESIZE_IN_PROGRESS,
};
use crate::platform::{PatchOp, PlatformClient};
use crate::store::{get_secret, secret_string, ObjectStore};

/// Network given to a ceph backend that does not name one.
const CEPH_BACKEND: &str = "ceph";
const CEPH_DEFAULT_NETWORK: &str = "mgmt";

/// Reconciles a `System` resource.
///
/// # Errors
///
/// Returns an error if the preamble fails, the platform client cannot be
/// built, the platform cannot be queried, or a step fails.
pub async fn reconcile_system(
    system: Arc<System>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let instance = match prepare(&ctx, system.as_ref()).await? {
        Preamble::Done(action) => return Ok(action),
        Preamble::Proceed(prepared) => prepared.instance,
    };
    if is_deleting(&instance) {
        return Ok(Action::await_change());
    }

    let namespace = instance.namespace().unwrap_or_default();
    ctx.manager
        .cancel_monitor(&instance.uid().unwrap_or_default());

    let client = platform_client(&ctx, &namespace).await?;

    if instance.status.as_ref().is_some_and(|s| s.strategy_applied) {
        info!(
            namespace = %namespace,
            "Strategy applied before restart; resuming strategy tracking"
        );
        ctx.manager.resume_strategy(&namespace);
    }

    let with_license =
        ctx.config.is_enabled(ReconcilerName::License) && instance.spec.license.is_some();
    let mut info = SystemInfo::load(client.as_ref(), with_license).await?;
    let spec = desired_spec(&ctx, &instance, &info).await?;

    let (ready, result) =
        reconcile_resource(&ctx, client.as_ref(), &instance, spec, &mut info).await;

    if ready {
        mark_ready(&ctx, &instance, &info.system).await?;
    }

    let latest = reload(ctx.store(), &instance).await?;
    let latest = sync_status(&ctx, &latest, Some(&info.system.id), result.is_ok()).await?;
    record_platform_status(ctx.store(), &latest, &info.system).await?;

    result.map(|()| Action::requeue(RESYNC_INTERVAL))
}

/// Returns the namespace's platform client, building it when missing.
///
/// A rebuilt client wakes the dependents of a system that was already ready,
/// since they stopped while the client was gone.
async fn platform_client(
    ctx: &Context,
    namespace: &str,
) -> Result<Arc<dyn PlatformClient>, ReconcileError> {
    if let Some(client) = ctx.manager.get_platform_client(namespace) {
        return Ok(client);
    }

    let client = ctx
        .manager
        .build_platform_client(namespace, SYSTEM_ENDPOINT_NAME, SYSTEM_ENDPOINT_TYPE)
        .await?;

    if ctx.manager.get_system_ready(namespace) {
        ctx.manager.notify_system_dependencies(namespace).await?;
    }
    Ok(client)
}

/// Everything the platform reports about the system.
#[derive(Debug, Clone, Default)]
struct SystemInfo {
    system: PlatformSystem,
    dns: Option<Dns>,
    ntp: Option<Ntp>,
    ptp: Option<Ptp>,
    drbd: Option<Drbd>,
    service_parameters: Vec<ServiceParameter>,
    storage_backends: Vec<PlatformStorageBackend>,
    filesystems: Vec<ControllerFileSystem>,
    certificates: Vec<Certificate>,
    license: Option<License>,
}

impl SystemInfo {
    async fn load(client: &dyn PlatformClient, with_license: bool) -> Result<Self, PlatformError> {
        let license = if with_license {
            Some(inventory::get_license(client).await?)
        } else {
            None
        };

        Ok(Self {
            system: inventory::get_default(client).await?,
            dns: inventory::get_dns(client).await?,
            ntp: inventory::get_ntp(client).await?,
            ptp: inventory::get_ptp(client).await?,
            drbd: inventory::get_drbd(client).await?,
            service_parameters: inventory::list_service_parameters(client).await?,
            storage_backends: inventory::list_storage_backends(client).await?,
            filesystems: inventory::list_controller_filesystems(client).await?,
            certificates: inventory::list_certificates(client).await?,
            license,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NO_CONTENT)
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Describes the platform's current configuration as a spec.
///
/// Certificates and the license are never part of it.
fn spec_from_info(info: &SystemInfo) -> SystemSpec {
    let system = &info.system;

    let backends = info
        .storage_backends
        .iter()
        .map(|b| StorageBackend {
            name: b.name.clone(),
            backend_type: b.backend.clone(),
            services: b.services.as_deref().map(split_list),
            replication_factor: None,
            partition_size: None,
            network: None,
        })
        .collect::<Vec<_>>();
    let filesystems = info
        .filesystems
        .iter()
        .map(|fs| ControllerFileSystemInfo {
            name: fs.name.clone(),
            size: fs.size,
        })
        .collect::<Vec<_>>();

    SystemSpec {
        description: non_empty(&system.description),
        location: non_empty(&system.location),
        latitude: non_empty(&system.latitude),
        longitude: non_empty(&system.longitude),
        contact: non_empty(&system.contact),
        dns_servers: info.dns.as_ref().map(|d| split_list(&d.nameservers)),
        ntp_servers: info.ntp.as_ref().map(|n| split_list(&n.ntpservers)),
        ptp: info.ptp.as_ref().map(|p| PtpInfo {
            mode: non_empty(&p.mode),
            transport: non_empty(&p.transport),
            mechanism: non_empty(&p.mechanism),
        }),
        certificates: None,
        license: None,
        service_parameters: (!info.service_parameters.is_empty()).then(|| {
            info.service_parameters
                .iter()
                .map(|p| ServiceParameterInfo {
                    service: p.service.clone(),
                    section: p.section.clone(),
                    param_name: p.param_name.clone(),
                    param_value: p.param_value.clone(),
                    personality: p.personality.clone(),
                    resource: p.resource.clone(),
                })
                .collect()
        }),
        storage: Some(SystemStorageInfo {
            backends: (!backends.is_empty()).then_some(backends),
            drbd: info.drbd.as_ref().map(|d| DrbdConfiguration {
                link_utilization: d.link_util,
            }),
            filesystems: (!filesystems.is_empty()).then_some(filesystems),
        }),
        vswitch_type: non_empty(&system.capabilities.vswitch_type),
    }
}

/// Gives ceph backends without a network the management network.
fn fill_backend_networks(spec: &mut SystemSpec) {
    let backends = spec.storage.as_mut().and_then(|s| s.backends.as_mut());
    for backend in backends.into_iter().flatten() {
        if backend.backend_type == CEPH_BACKEND && backend.network.is_none() {
            backend.network = Some(CEPH_DEFAULT_NETWORK.to_string());
        }
    }
}

/// Lays the user's spec over the recorded platform defaults.
fn merge_spec(
    mut defaults: SystemSpec,
    spec: &SystemSpec,
) -> Result<SystemSpec, serde_json::Error> {
    defaults.certificates = None;
    defaults.license = None;
    let mut merged = MergeTransformer::default().merge(&defaults, spec)?;
    fill_backend_networks(&mut merged);
    Ok(merged)
}

/// Returns the spec to enforce, recording the platform defaults on the
/// first pass.
async fn desired_spec(
    ctx: &Context,
    instance: &System,
    info: &SystemInfo,
) -> Result<SystemSpec, ReconcileError> {
    let stored = instance.status.as_ref().and_then(|s| s.defaults.as_deref());

    let defaults = if let Some(stored) = stored {
        serde_json::from_str(stored)?
    } else {
        info!(name = %instance.name_any(), "collecting system default values");
        let defaults = spec_from_info(info);
        patch_status(
            ctx.store(),
            instance,
            json!({ "defaults": serde_json::to_string(&defaults)? }),
        )
        .await?;
        ctx.normal_event(instance, reasons::CREATED, "system defaults collected and stored")
            .await;
        defaults
    };

    Ok(merge_spec(defaults, &instance.spec)?)
}

/// A certificate read from its secret, ready to install.
#[derive(Debug, Clone, PartialEq)]
struct CertificateBundle {
    cert_type: String,
    signature: String,
    pem: Vec<u8>,
    private_key: bool,
}

/// Identifies a certificate the way the platform does: `<type>_<serial>`.
fn certificate_signature(
    cert_type: &str,
    pem_bytes: &[u8],
    secret: &str,
) -> Result<String, ReconcileError> {
    let block = pem::parse(pem_bytes).map_err(|_| {
        ReconcileError::UserData(format!("unexpected certificate contents in secret {secret}"))
    })?;
    let (_, cert) = X509Certificate::from_der(block.contents()).map_err(|_| {
        ReconcileError::UserData(format!("corrupt certificate contents in secret {secret}"))
    })?;
    Ok(format!("{cert_type}_{}", cert.tbs_certificate.serial))
}

/// Reads every certificate secret named by the spec.
///
/// Missing secrets are skipped with a Warning event.
async fn load_certificates(
    ctx: &Context,
    instance: &System,
) -> Result<Vec<CertificateBundle>, ReconcileError> {
    let Some(certificates) = &instance.spec.certificates else {
        return Ok(Vec::new());
    };
    let namespace = instance.namespace().unwrap_or_default();

    let mut bundles = Vec::with_capacity(certificates.len());
    for certificate in certificates {
        let Some(secret) = get_secret(ctx.store(), &namespace, &certificate.secret).await? else {
            ctx.warning_event(
                instance,
                reasons::DEPENDENCY,
                format!(
                    "skipping {:?} certificate {:?} from system",
                    certificate.cert_type, certificate.secret
                ),
            )
            .await;
            continue;
        };

        let missing = |key: &str| {
            ReconcileError::UserData(format!(
                "missing {key:?} key in certificate secret {}",
                certificate.secret
            ))
        };

        let mut pem = secret_string(&secret, SECRET_CERT_KEY)
            .ok_or_else(|| missing(SECRET_CERT_KEY))?
            .into_bytes();
        let signature = certificate_signature(&certificate.cert_type, &pem, &certificate.secret)?;

        let private_key = certificate.private_key_expected();
        if private_key {
            let key = secret_string(&secret, SECRET_PRIVATE_KEY_KEY)
                .ok_or_else(|| missing(SECRET_PRIVATE_KEY_KEY))?;
            if !pem.ends_with(b"\n") {
                pem.push(b'\n');
            }
            pem.extend_from_slice(key.as_bytes());
        }

        bundles.push(CertificateBundle {
            cert_type: certificate.cert_type.clone(),
            signature,
            pem,
            private_key,
        });
    }
    Ok(bundles)
}

/// Reads the license file named by the spec.
async fn load_license(
    ctx: &Context,
    instance: &System,
) -> Result<Option<Vec<u8>>, ReconcileError> {
    let Some(license) = &instance.spec.license else {
        return Ok(None);
    };
    let namespace = instance.namespace().unwrap_or_default();

    let Some(secret) = get_secret(ctx.store(), &namespace, &license.secret).await? else {
        let message = format!("waiting for license {:?} to be created", license.secret);
        ctx.warning_event(instance, reasons::DEPENDENCY, &message)
            .await;
        return Err(ReconcileError::MissingKubernetesResource(message));
    };

    let contents = secret_string(&secret, SECRET_LICENSE_CONTENT_KEY).ok_or_else(|| {
        ReconcileError::UserData(format!(
            "missing {SECRET_LICENSE_CONTENT_KEY:?} key in license secret {}",
            license.secret
        ))
    })?;
    Ok(Some(contents.into_bytes()))
}

/// The state the System asks for.
#[derive(Debug, Clone, Default)]
struct Desired {
    name: String,
    https_enabled: bool,
    spec: SystemSpec,
    certificates: Vec<CertificateBundle>,
    license: Option<Vec<u8>>,
}

/// A service parameter to create or patch.
#[derive(Debug, Clone, PartialEq)]
enum ParameterChange {
    Create(ServiceParameterInfo),
    Update {
        id: String,
        parameter: ServiceParameterInfo,
        ops: Vec<PatchOp>,
    },
}

/// Every platform change a pass has to make.
#[derive(Debug, Clone, Default)]
struct Plan {
    attributes: Vec<PatchOp>,
    certificates: Vec<CertificateBundle>,
    license: Option<Vec<u8>>,
    drbd: Option<i32>,
    dns: Option<String>,
    ntp: Option<String>,
    ptp: Vec<PatchOp>,
    parameters: Vec<ParameterChange>,
    backends: Vec<StorageBackend>,
    filesystems: Vec<ControllerFileSystemInfo>,
}

impl Plan {
    fn new(config: &ReconcilerConfig, desired: &Desired, info: &SystemInfo) -> Self {
        let spec = &desired.spec;
        let storage = spec.storage.clone().unwrap_or_default();
        let enabled = |name| config.is_enabled(name);
        let mut plan = Self::default();

        if enabled(ReconcilerName::System) {
            plan.attributes =
                attribute_ops(&desired.name, spec, desired.https_enabled, &info.system);
        }

        plan.certificates = desired
            .certificates
            .iter()
            .filter(|b| !info.certificates.iter().any(|c| c.signature == b.signature))
            .cloned()
            .collect();

        plan.license = desired.license.clone().filter(|contents| {
            info.license
                .as_ref()
                .is_none_or(|l| l.content.as_bytes() != contents.as_slice())
        });

        if enabled(ReconcilerName::Drbd) {
            plan.drbd = storage
                .drbd
                .map(|d| d.link_utilization)
                .filter(|link| info.drbd.as_ref().map(|d| d.link_util) != Some(*link));
        }

        if enabled(ReconcilerName::Dns) {
            let current = info.dns.as_ref().map_or("", |d| d.nameservers.as_str());
            plan.dns = servers_update(spec.dns_servers.as_deref(), current);
        }

        if enabled(ReconcilerName::Ntp) {
            let current = info.ntp.as_ref().map_or("", |n| n.ntpservers.as_str());
            plan.ntp = servers_update(spec.ntp_servers.as_deref(), current);
        }

        if enabled(ReconcilerName::Ptp) {
            if let Some(ptp) = &spec.ptp {
                plan.ptp = ptp_ops(ptp, &info.ptp.clone().unwrap_or_default());
            }
        }

        if enabled(ReconcilerName::ServiceParameters) {
            plan.parameters = parameter_changes(
                spec.service_parameters.as_deref().unwrap_or_default(),
                &info.service_parameters,
            );
        }

        if enabled(ReconcilerName::Backends) {
            plan.backends = storage
                .backends
                .unwrap_or_default()
                .into_iter()
                .filter(|b| {
                    !info
                        .storage_backends
                        .iter()
                        .any(|current| current.backend == b.backend_type && current.name == b.name)
                })
                .collect();
        }

        if enabled(ReconcilerName::SystemFileSystems) {
            plan.filesystems = storage
                .filesystems
                .unwrap_or_default()
                .into_iter()
                .filter(|fs| {
                    info.filesystems
                        .iter()
                        .find(|current| current.name == fs.name)
                        .is_none_or(|current| fs.size > current.size)
                })
                .collect();
        }

        plan
    }

    fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.certificates.is_empty()
            && self.license.is_none()
            && self.drbd.is_none()
            && self.dns.is_none()
            && self.ntp.is_none()
            && self.ptp.is_empty()
            && self.parameters.is_empty()
            && self.backends.is_empty()
            && self.filesystems.is_empty()
    }
}

fn attribute_ops(
    name: &str,
    spec: &SystemSpec,
    https_enabled: bool,
    current: &PlatformSystem,
) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    if name != current.name {
        ops.push(PatchOp::replace("name", name));
    }

    let fields = [
        ("description", &spec.description, &current.description),
        ("contact", &spec.contact, &current.contact),
        ("location", &spec.location, &current.location),
        ("latitude", &spec.latitude, &current.latitude),
        ("longitude", &spec.longitude, &current.longitude),
    ];
    for (field, desired, observed) in fields {
        if let Some(desired) = desired.as_deref().filter(|d| d != observed) {
            ops.push(PatchOp::replace(field, desired));
        }
    }

    if https_enabled != current.capabilities.https_enabled {
        ops.push(PatchOp::replace("https_enabled", https_enabled.to_string()));
    }
    if let Some(vswitch) = spec
        .vswitch_type
        .as_deref()
        .filter(|v| *v != current.capabilities.vswitch_type)
    {
        ops.push(PatchOp::replace("vswitch_type", vswitch));
    }
    ops
}

/// Returns the server list to send when it differs from `current`.
///
/// An empty list is sent as `NC`, which the platform reports back as an
/// empty string.
fn servers_update(desired: Option<&[String]>, current: &str) -> Option<String> {
    let desired = desired?;
    if desired.is_empty() {
        return (!current.is_empty()).then(|| NO_CONTENT.to_string());
    }
    let joined = desired.join(",");
    (joined != current).then_some(joined)
}

fn ptp_ops(desired: &PtpInfo, current: &Ptp) -> Vec<PatchOp> {
    [
        ("mode", &desired.mode, &current.mode),
        ("mechanism", &desired.mechanism, &current.mechanism),
        ("transport", &desired.transport, &current.transport),
    ]
    .into_iter()
    .filter_map(|(field, desired, observed)| {
        desired
            .as_deref()
            .filter(|d| d != observed)
            .map(|d| PatchOp::replace(field, d))
    })
    .collect()
}

/// Matches parameters by service, section and name.
///
/// Personality and resource are only compared when both sides set them.
fn parameter_changes(
    desired: &[ServiceParameterInfo],
    current: &[ServiceParameter],
) -> Vec<ParameterChange> {
    desired
        .iter()
        .filter_map(|parameter| {
            let Some(existing) = current.iter().find(|p| {
                p.service == parameter.service
                    && p.section == parameter.section
                    && p.param_name == parameter.param_name
            }) else {
                return Some(ParameterChange::Create(parameter.clone()));
            };

            let mut ops = Vec::new();
            if parameter.param_value != existing.param_value {
                ops.push(PatchOp::replace("value", parameter.param_value.as_str()));
            }
            let optional = [
                ("resource", &parameter.resource, &existing.resource),
                ("personality", &parameter.personality, &existing.personality),
            ];
            for (field, desired, observed) in optional {
                if let (Some(d), Some(o)) = (desired, observed) {
                    if d != o {
                        ops.push(PatchOp::replace(field, d.as_str()));
                    }
                }
            }

            (!ops.is_empty()).then(|| ParameterChange::Update {
                id: existing.id.clone(),
                parameter: parameter.clone(),
                ops,
            })
        })
        .collect()
}

/// Renders the pending changes for `status.delta`.
fn plan_delta(
    desired: &Desired,
    plan: &Plan,
    info: &SystemInfo,
) -> Result<String, serde_json::Error> {
    let mut wanted = desired.spec.clone();
    wanted.certificates = None;
    wanted.license = None;
    let mut current = spec_from_info(info);
    fill_backend_networks(&mut current);

    let mut lines = vec![delta_string(&wanted, &current)?];
    lines.extend(
        plan.certificates
            .iter()
            .map(|c| format!("\t+ certificate: {}", c.signature)),
    );
    if plan.license.is_some() {
        lines.push("\t+ license: updated".to_string());
    }
    lines.retain(|l| !l.is_empty());
    Ok(lines.join("\n"))
}

/// Computes and applies the pass's changes.
///
/// Returns whether the namespace may be marked ready together with the
/// outcome. Only a failure before the filesystem step keeps a System that
/// was never reconciled from becoming ready.
async fn reconcile_resource(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &System,
    spec: SystemSpec,
    info: &mut SystemInfo,
) -> (bool, Result<(), ReconcileError>) {
    let reconciled = is_reconciled(instance);

    let plan = match plan_changes(ctx, instance, spec, info).await {
        Ok(Some(plan)) => plan,
        Ok(None) => return (true, Ok(())),
        Err(e) => return (reconciled, Err(e)),
    };

    if let Err(e) = apply_initial(ctx, client, instance, &plan, info).await {
        return (reconciled, Err(e));
    }

    if let Err(e) = reconcile_filesystems(ctx, client, instance, &plan.filesystems, info).await {
        return (true, Err(e));
    }

    ctx.normal_event(instance, reasons::UPDATED, "system has been provisioned")
        .await;
    (true, Ok(()))
}

/// Builds the plan, or `None` when a reconciled System needs nothing.
async fn plan_changes(
    ctx: &Context,
    instance: &System,
    spec: SystemSpec,
    info: &SystemInfo,
) -> Result<Option<Plan>, ReconcileError> {
    let certificates = if ctx.config.is_enabled(ReconcilerName::Certificate) {
        load_certificates(ctx, instance).await?
    } else {
        Vec::new()
    };
    let license = if ctx.config.is_enabled(ReconcilerName::License) {
        load_license(ctx, instance).await?
    } else {
        None
    };

    let desired = Desired {
        name: instance.name_any(),
        https_enabled: instance.spec.https_enabled(),
        spec,
        certificates,
        license,
    };
    let plan = Plan::new(&ctx.config, &desired, info);

    if plan.is_empty() {
        debug!(name = %instance.name_any(), "no changes between spec and current configuration");
        record_delta(ctx.store(), instance, "").await?;
        if is_reconciled(instance) {
            return Ok(None);
        }
        return Ok(Some(plan));
    }

    record_delta(ctx.store(), instance, &plan_delta(&desired, &plan, info)?).await?;
    check_after_in_sync(ctx, instance, Change::Configure).await?;
    Ok(Some(plan))
}

async fn apply_initial(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &System,
    plan: &Plan,
    info: &mut SystemInfo,
) -> Result<(), ReconcileError> {
    if !plan.attributes.is_empty() {
        info!(ops = ?plan.attributes, "updating system config");
        info.system = inventory::update_system(client, &info.system.id, &plan.attributes).await?;
        metrics::record_platform_change("System", "update");
        ctx.normal_event(instance, reasons::UPDATED, "system has been updated")
            .await;
    }

    install_certificates(ctx, client, instance, &plan.certificates, info).await?;

    if let Some(contents) = &plan.license {
        let checksum = format!("{:x}", Sha256::digest(contents));
        info!(sha256 = %checksum, "installing license");
        inventory::install_license(client, contents.clone()).await?;
        ctx.normal_event(instance, reasons::CREATED, "license has been installed")
            .await;
    }

    if let Some(link_util) = plan.drbd {
        let id = required_id(info.drbd.as_ref().map(|d| d.id.as_str()), "DRBD")?;
        info!(link_util, "updating DRBD configuration");
        info.drbd = Some(inventory::update_drbd(client, &id, link_util).await?);
        ctx.normal_event(instance, reasons::UPDATED, "DRBD configuration has been updated")
            .await;
    }

    if let Some(nameservers) = &plan.dns {
        let id = required_id(info.dns.as_ref().map(|d| d.id.as_str()), "DNS")?;
        info!(nameservers = %nameservers, "updating DNS servers");
        info.dns = Some(inventory::update_dns(client, &id, nameservers).await?);
        ctx.normal_event(instance, reasons::UPDATED, "DNS servers have been updated")
            .await;
    }

    if let Some(servers) = &plan.ntp {
        let id = required_id(info.ntp.as_ref().map(|n| n.id.as_str()), "NTP")?;
        info!(servers = %servers, "updating NTP servers");
        info.ntp = Some(inventory::update_ntp(client, &id, servers).await?);
        ctx.normal_event(instance, reasons::UPDATED, "NTP servers have been updated")
            .await;
    }

    if !plan.ptp.is_empty() {
        let id = required_id(info.ptp.as_ref().map(|p| p.id.as_str()), "PTP")?;
        info!(ops = ?plan.ptp, "updating PTP config");
        info.ptp = Some(inventory::update_ptp(client, &id, &plan.ptp).await?);
        ctx.normal_event(instance, reasons::UPDATED, "PTP info has been updated")
            .await;
    }

    apply_parameters(ctx, client, instance, &plan.parameters).await?;
    create_backends(ctx, client, instance, &plan.backends).await?;
    Ok(())
}

fn required_id(id: Option<&str>, what: &str) -> Result<String, ReconcileError> {
    id.map(str::to_string).ok_or_else(|| {
        ReconcileError::MissingSystemResource(format!(
            "{what} configuration not found on the system"
        ))
    })
}

/// Refuses to send private keys over an unprotected connection.
fn check_key_transport(
    ctx: &Context,
    client: &dyn PlatformClient,
    system: &PlatformSystem,
) -> Result<(), ReconcileError> {
    if !ctx.config.https_required(ReconcilerName::Certificate) {
        info!("allowing certificates to be installed over HTTP connection");
        return Ok(());
    }
    if !system.capabilities.https_enabled {
        return Err(ReconcileError::SystemDependency(
            "it is unsafe to install certificates while HTTPS is disabled".to_string(),
        ));
    }
    if client.endpoint().starts_with(HTTP_PREFIX) {
        return Err(ReconcileError::HttpsClientRequired(
            "it is unsafe to install certificates thru a non HTTPS URL".to_string(),
        ));
    }
    Ok(())
}

async fn install_certificates(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &System,
    certificates: &[CertificateBundle],
    info: &mut SystemInfo,
) -> Result<(), ReconcileError> {
    if certificates.is_empty() {
        return Ok(());
    }

    for bundle in certificates {
        if bundle.private_key {
            check_key_transport(ctx, client, &info.system)?;
        }
        info!(signature = %bundle.signature, "installing certificate");
        inventory::install_certificate(client, &bundle.cert_type, bundle.pem.clone()).await?;
        metrics::record_platform_change("Certificate", "create");
        ctx.normal_event(
            instance,
            reasons::CREATED,
            format!("certificate {:?} has been installed", bundle.signature),
        )
        .await;
    }

    info.certificates = inventory::list_certificates(client).await?;
    Ok(())
}

async fn apply_parameters(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &System,
    changes: &[ParameterChange],
) -> Result<(), ReconcileError> {
    for change in changes {
        match change {
            ParameterChange::Create(parameter) => {
                inventory::create_service_parameter(
                    client,
                    &parameter.service,
                    &parameter.section,
                    &parameter.param_name,
                    &parameter.param_value,
                    parameter.personality.as_deref(),
                    parameter.resource.as_deref(),
                )
                .await?;
                ctx.normal_event(
                    instance,
                    reasons::CREATED,
                    format!(
                        "service parameter {:?} {:?} {:?} has been created",
                        parameter.service, parameter.section, parameter.param_name
                    ),
                )
                .await;
            }
            ParameterChange::Update { id, parameter, ops } => {
                inventory::update_service_parameter(client, id, ops).await?;
                ctx.normal_event(
                    instance,
                    reasons::UPDATED,
                    format!(
                        "service parameter {:?} {:?} {:?} has been modified",
                        parameter.service, parameter.section, parameter.param_name
                    ),
                )
                .await;
            }
        }
        metrics::record_platform_change("ServiceParameter", "update");
    }
    Ok(())
}

fn backend_body(backend: &StorageBackend) -> Value {
    let mut body = json!({
        "confirmed": true,
        "backend": backend.backend_type,
        "name": backend.name,
        "network": backend.network,
        "services": backend.services.as_ref().map(|s| s.join(",")),
    });
    if let Some(replication) = backend.replication_factor {
        body["capabilities"] = json!({ "replication": replication.to_string() });
    }
    body
}

async fn create_backends(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &System,
    backends: &[StorageBackend],
) -> Result<(), ReconcileError> {
    for backend in backends {
        info!(name = %backend.name, backend = %backend.backend_type, "creating storage backend");
        let created = inventory::create_storage_backend(client, &backend_body(backend)).await?;
        metrics::record_platform_change("StorageBackend", "create");
        ctx.normal_event(
            instance,
            reasons::CREATED,
            format!("{} storage backend created", created.name),
        )
        .await;
    }
    Ok(())
}

/// Grows controller filesystems.
///
/// Resizing needs every controller available (one on simplex systems) and no
/// resize already running; a monitor waits otherwise.
async fn reconcile_filesystems(
    ctx: &Context,
    client: &dyn PlatformClient,
    instance: &System,
    filesystems: &[ControllerFileSystemInfo],
    info: &SystemInfo,
) -> Result<(), ReconcileError> {
    if filesystems.is_empty() {
        return Ok(());
    }

    let hosts = hosts::list_hosts(client).await?;
    let required = if info.system.system_mode.eq_ignore_ascii_case(SYSTEM_MODE_SIMPLEX) {
        1
    } else {
        2
    };

    let mut updates = Vec::with_capacity(filesystems.len());
    for desired in filesystems {
        let Some(current) = info.filesystems.iter().find(|fs| fs.name == desired.name) else {
            return Err(ReconcileError::MissingSystemResource(format!(
                "unknown controller filesystem {:?}",
                desired.name
            )));
        };

        if !controllers_available(&hosts, required) {
            if is_principal(instance) {
                patch_status(
                    ctx.store(),
                    instance,
                    json!({ "strategyRequired": STRATEGY_UNLOCK_REQUIRED }),
                )
                .await?;
                ctx.manager.set_resource_info(
                    strategy::RESOURCE_SYSTEM,
                    "",
                    &instance.name_any(),
                    is_reconciled(instance),
                    STRATEGY_UNLOCK_REQUIRED,
                );
            }
            return Err(ctx.manager.start_monitor(
                monitors::available_controllers_monitor(instance, required),
                format!(
                    "waiting for {required} controller(s) in available state before resizing filesystems"
                ),
            ));
        }

        if current.state == FS_RESIZE_IN_PROGRESS {
            return Err(ctx.manager.start_monitor(
                monitors::filesystem_resize_monitor(instance),
                format!("filesystem resize operation already in progress on {:?}", current.name),
            ));
        }

        updates.push((desired.name.clone(), desired.size));
    }

    info!(updates = ?updates, "updating controller filesystem sizes");
    inventory::resize_controller_filesystems(client, &info.system.id, &updates).await?;
    metrics::record_platform_change("ControllerFileSystem", "update");
    ctx.normal_event(instance, reasons::UPDATED, "filesystem sizes have been updated")
        .await;
    Ok(())
}

/// Marks the namespace ready and wakes every dependent.
///
/// The ready flag is reverted when the dependents cannot be notified so that
/// the next pass tries again.
async fn mark_ready(
    ctx: &Context,
    instance: &System,
    system: &PlatformSystem,
) -> Result<(), ReconcileError> {
    let namespace = instance.namespace().unwrap_or_default();
    if ctx.manager.get_system_ready(&namespace) {
        return Ok(());
    }

    ctx.manager
        .set_system_type(&namespace, &system.system_type.to_lowercase());
    ctx.manager.set_system_ready(&namespace, true);
    ctx.normal_event(
        instance,
        reasons::UPDATED,
        "system is now ready for other reconcilers",
    )
    .await;

    if let Err(e) = ctx.manager.notify_system_dependencies(&namespace).await {
        ctx.manager.set_system_ready(&namespace, false);
        return Err(e.into());
    }
    Ok(())
}

/// Copies the platform's type, mode and version into the status.
async fn record_platform_status(
    store: &dyn ObjectStore,
    instance: &System,
    system: &PlatformSystem,
) -> Result<System, StoreError> {
    let status = instance.status.clone().unwrap_or_default();
    let system_type = system.system_type.to_lowercase();
    let system_mode = system.system_mode.to_lowercase();
    let software_version = system.software_version.to_lowercase();

    if status.system_type == system_type
        && status.system_mode == system_mode
        && status.software_version == software_version
    {
        return Ok(instance.clone());
    }

    patch_status(
        store,
        instance,
        json!({
            "systemType": system_type,
            "systemMode": system_mode,
            "softwareVersion": software_version,
        }),
    )
    .await
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod system_tests;
