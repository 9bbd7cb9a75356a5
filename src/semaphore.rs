//! Threads sharing one list through a counting semaphore.
//!
//! One OS thread per address looks the address up, then enters the critical
//! section that appends to the shared list. At most `permits` threads are
//! inside at any instant; everyone else blocks in [`Semaphore::acquire`].

use std::net::Ipv4Addr;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use serde::Deserialize;

use crate::config::SemaphoreConfig;
use crate::error::{Error, Result};
use crate::fetch::blocking_client;
use crate::{Report, Stopwatch};

pub const RDAP_URL: &str = "https://rdap.org/ip";

/// Counting semaphore.
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    released: Condvar,
}

#[derive(Debug)]
struct State {
    available: usize,
    holders: usize,
    peak: usize,
}

impl Semaphore {
    /// With zero permits every `acquire` blocks forever.
    pub fn new(permits: usize) -> Self {
        Semaphore {
            state: Mutex::new(State {
                available: permits,
                holders: 0,
                peak: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Block until a permit is free. The permit is returned on drop.
    pub fn acquire(&self) -> Permit<'_> {
        let mut state = self.state.lock();
        while state.available == 0 {
            self.released.wait(&mut state);
        }
        Self::take(&mut state);
        Permit { semaphore: self }
    }

    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();
        if state.available == 0 {
            return None;
        }
        Self::take(&mut state);
        Some(Permit { semaphore: self })
    }

    fn take(state: &mut State) {
        state.available -= 1;
        state.holders += 1;
        state.peak = state.peak.max(state.holders);
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.available += 1;
        state.holders -= 1;
        self.released.notify_one();
    }

    pub fn available(&self) -> usize {
        self.state.lock().available
    }

    pub fn holders(&self) -> usize {
        self.state.lock().holders
    }

    /// Highest number of simultaneous holders so far.
    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }
}

#[must_use = "the permit is released as soon as it is dropped"]
#[derive(Debug)]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// What a registry knows about an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub handle: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub range: Option<(String, String)>,
}

pub trait AddressLookup: Sync {
    /// `Ok(None)` when the registry has no record.
    fn lookup(&self, address: Ipv4Addr) -> Result<Option<AddressInfo>>;
}

/// Registry lookups over RDAP.
pub struct RdapLookup {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl RdapLookup {
    pub fn new() -> Result<Self> {
        Self::with_base_url(RDAP_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(RdapLookup {
            client: blocking_client()?,
            base_url: base_url.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapNetwork {
    handle: String,
    name: Option<String>,
    country: Option<String>,
    start_address: Option<String>,
    end_address: Option<String>,
}

impl From<RdapNetwork> for AddressInfo {
    fn from(network: RdapNetwork) -> Self {
        AddressInfo {
            handle: network.handle,
            name: network.name,
            country: network.country,
            range: network.start_address.zip(network.end_address),
        }
    }
}

impl AddressLookup for RdapLookup {
    fn lookup(&self, address: Ipv4Addr) -> Result<Option<AddressInfo>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), address);
        let response = self.client.get(&url).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let network: RdapNetwork = response.error_for_status()?.json()?;
        Ok(Some(network.into()))
    }
}

/// Reject addresses no registry will ever hold a record for.
pub fn ensure_public(address: Ipv4Addr) -> Result<()> {
    let [a, b, c, _] = address.octets();
    let reserved = address.is_private()
        || address.is_loopback()
        || address.is_link_local()
        || address.is_multicast()
        || address.is_broadcast()
        || address.is_documentation()
        || address.is_unspecified()
        || a == 0
        || a >= 240
        // shared address space, 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
        // IETF protocol assignments, 192.0.0.0/24
        || (a == 192 && b == 0 && c == 0)
        // benchmarking, 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18);
    if reserved {
        Err(Error::ReservedAddress(address))
    } else {
        Ok(())
    }
}

/// `count` uniformly random IPv4 addresses, reserved ones included.
pub fn random_addresses(count: usize, rng: &mut impl Rng) -> Vec<Ipv4Addr> {
    (0..count).map(|_| Ipv4Addr::from(rng.random::<u32>())).collect()
}

#[derive(Debug)]
pub struct SemaphoreReport {
    pub elapsed: Duration,
    /// Per address: `Some` if it was added to the shared list.
    pub units: Vec<Result<Option<AddressInfo>>>,
    /// The shared list, in the order threads entered the critical section.
    pub records: Vec<(Ipv4Addr, AddressInfo)>,
    /// Highest number of threads inside the critical section at once.
    pub peak: usize,
}

impl SemaphoreReport {
    pub fn secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn added(&self) -> usize {
        self.units.iter().filter(|u| matches!(u, Ok(Some(_)))).count()
    }
}

impl From<SemaphoreReport> for Report<Option<AddressInfo>> {
    fn from(report: SemaphoreReport) -> Self {
        Report {
            elapsed: report.elapsed,
            units: report.units,
        }
    }
}

pub fn run(config: &SemaphoreConfig, lookup: &dyn AddressLookup) -> Result<SemaphoreReport> {
    if config.permits == 0 {
        return Err(Error::NoPermits);
    }
    let clock = Stopwatch::start();
    let semaphore = Semaphore::new(config.permits);
    let records = Mutex::new(Vec::new());

    let units = thread::scope(|s| {
        let handles: Vec<_> = config
            .addresses
            .iter()
            .enumerate()
            .map(|(num, &address)| {
                let (semaphore, records) = (&semaphore, &records);
                thread::Builder::new()
                    .name(format!("thread-{num}"))
                    .spawn_scoped(s, move || {
                        address_task(num, address, lookup, semaphore, records, config.hold, clock)
                    })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|payload| Err(Error::from_panic(payload))),
                Err(e) => Err(Error::Io(e)),
            })
            .collect::<Vec<_>>()
    });

    let records = records.into_inner();
    let report = SemaphoreReport {
        elapsed: clock.elapsed(),
        units,
        records,
        peak: semaphore.peak(),
    };

    clock.note(format!("Shared list holds {} addresses:", report.records.len()));
    for (address, info) in &report.records {
        clock.note(format!(
            "  {address} {} {}",
            info.handle,
            info.name.as_deref().unwrap_or("-")
        ));
    }
    Ok(report)
}

fn address_task(
    num: usize,
    address: Ipv4Addr,
    lookup: &dyn AddressLookup,
    semaphore: &Semaphore,
    records: &Mutex<Vec<(Ipv4Addr, AddressInfo)>>,
    hold: Duration,
    clock: Stopwatch,
) -> Result<Option<AddressInfo>> {
    let tag = format!("THREAD-{num}");
    let result = ensure_public(address).and_then(|()| lookup.lookup(address));
    let info = match result {
        Ok(Some(info)) => info,
        Ok(None) => {
            debug!("{tag}: no record for {address}");
            return Ok(None);
        }
        Err(e) => {
            clock.say(&tag, format!("Exception {e}"));
            warn!("{tag} {address}: {e}");
            return Err(e);
        }
    };

    {
        let _permit = semaphore.acquire();
        clock.say(&tag, "Acquiring access to shared resource");
        records.lock().push((address, info.clone()));
        thread::sleep(hold);
    }
    clock.say(&tag, "Releasing access to shared resource");
    Ok(Some(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn permits_are_returned_on_drop() {
        let semaphore = Semaphore::new(2);
        let a = semaphore.acquire();
        let b = semaphore.try_acquire().unwrap();
        assert!(semaphore.try_acquire().is_none());
        assert_eq!(semaphore.holders(), 2);
        drop(a);
        assert_eq!(semaphore.available(), 1);
        drop(b);
        assert_eq!(semaphore.available(), 2);
        assert_eq!(semaphore.peak(), 2);
    }

    #[test]
    fn never_more_than_limit_inside() {
        let semaphore = Semaphore::new(4);
        let active = AtomicUsize::new(0);
        let highest = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    let _permit = semaphore.acquire();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    assert!(now <= 4, "{now} threads inside");
                    highest.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(highest.load(Ordering::SeqCst), 4);
        assert_eq!(semaphore.peak(), 4);
        assert_eq!(semaphore.available(), 4);
    }

    #[test]
    fn reserved_ranges() {
        for reserved in [
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "127.0.0.1",
            "169.254.10.10",
            "100.64.0.1",
            "100.127.255.255",
            "192.0.0.8",
            "192.0.2.1",
            "198.18.0.1",
            "198.19.255.1",
            "224.0.0.1",
            "240.0.0.1",
            "255.255.255.255",
            "0.0.0.0",
            "0.1.2.3",
        ] {
            let address: Ipv4Addr = reserved.parse().unwrap();
            assert!(
                matches!(ensure_public(address), Err(Error::ReservedAddress(a)) if a == address),
                "{reserved} should be reserved"
            );
        }
        for public in ["8.8.8.8", "21.177.64.80", "100.128.0.1", "198.20.0.1", "11.0.0.1"] {
            assert!(ensure_public(public.parse().unwrap()).is_ok(), "{public}");
        }
    }

    #[test]
    fn random_addresses_are_seeded() {
        let a = random_addresses(20, &mut StdRng::seed_from_u64(7));
        let b = random_addresses(20, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn rdap_network_fields() {
        let body = r#"{"handle":"NET-21-0-0-0-1","name":"DNIC-SNET-021","country":"US",
            "startAddress":"21.0.0.0","endAddress":"21.255.255.255","objectClassName":"ip network"}"#;
        let network: RdapNetwork = serde_json::from_str(body).unwrap();
        let info = AddressInfo::from(network);
        assert_eq!(info.handle, "NET-21-0-0-0-1");
        assert_eq!(info.country.as_deref(), Some("US"));
        assert_eq!(
            info.range,
            Some(("21.0.0.0".to_string(), "21.255.255.255".to_string()))
        );
    }
}
