use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::proto::{Filter, Laptop, Memory, memory::Unit};
use crate::{Error, Result};

/// Validates the identifier of `laptop`, generating one if it is empty.
///
/// Returns the final identifier.
pub fn ensure_laptop_id(laptop: &mut Laptop) -> Result<String> {
    if laptop.id.is_empty() {
        laptop.id = Uuid::new_v4().to_string();
    } else {
        Uuid::parse_str(&laptop.id)
            .map_err(|e| Error::InvalidArgument(format!("laptop ID is invalid: {e}")))?;
    }

    Ok(laptop.id.clone())
}

/// Concurrent in-memory laptop catalog.
///
/// Every laptop handed in or out is a deep copy, so callers can never observe
/// or corrupt the stored instance.
#[derive(Clone, Default)]
pub struct InMemoryLaptopStore {
    laptops: Arc<RwLock<HashMap<String, Laptop>>>,
}

impl InMemoryLaptopStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a copy of `laptop` and returns its identifier.
    ///
    /// An empty identifier is replaced by a fresh UUID. Fails with
    /// [`Error::AlreadyExists`] if the identifier is taken; the stored laptop
    /// is left untouched in that case.
    pub async fn save(&self, laptop: &Laptop) -> Result<String> {
        let mut copy = laptop.clone();
        let id = ensure_laptop_id(&mut copy)?;

        let mut laptops = self.laptops.write().await;
        if laptops.contains_key(&id) {
            return Err(Error::AlreadyExists(format!("laptop {id}")));
        }

        laptops.insert(id.clone(), copy);
        Ok(id)
    }

    /// Returns a copy of the laptop with `id`, if any.
    pub async fn find(&self, id: &str) -> Option<Laptop> {
        let laptops = self.laptops.read().await;
        laptops.get(id).cloned()
    }

    /// Scans the catalog and calls `found` with a copy of every laptop
    /// matching `filter`.
    ///
    /// The scan holds the read lock and stops at the first error returned by
    /// `found`, which is passed through. Match order is unspecified.
    pub async fn search<F, Fut, E>(
        &self,
        filter: &Filter,
        mut found: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(Laptop) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
    {
        let laptops = self.laptops.read().await;

        for laptop in laptops.values() {
            if is_qualified(filter, laptop) {
                found(laptop.clone()).await?;
            }
        }

        Ok(())
    }

    /// Number of stored laptops.
    pub async fn len(&self) -> usize {
        self.laptops.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.laptops.read().await.is_empty()
    }
}

/// Whether `laptop` satisfies every predicate of `filter`.
pub fn is_qualified(filter: &Filter, laptop: &Laptop) -> bool {
    if laptop.price_usd > filter.max_price_usd {
        return false;
    }

    let (cores, ghz) = laptop
        .cpu
        .as_ref()
        .map_or((0, 0.0), |cpu| (cpu.number_cores, cpu.min_ghz));

    if cores < filter.min_cpu_cores {
        return false;
    }

    if ghz < filter.min_cpu_ghz {
        return false;
    }

    to_bit(laptop.ram.as_ref()) >= to_bit(filter.min_ram.as_ref())
}

/// Normalizes a memory quantity to bits; missing or unknown units count as 0.
pub fn to_bit(memory: Option<&Memory>) -> u64 {
    let Some(memory) = memory else {
        return 0;
    };

    let multiplier: u64 = match Unit::try_from(memory.unit) {
        Ok(Unit::Bit) => 1,
        Ok(Unit::Byte) => 8,
        Ok(Unit::Kilobyte) => 8 << 10,
        Ok(Unit::Megabyte) => 8 << 20,
        Ok(Unit::Gigabyte) => 8 << 30,
        Ok(Unit::Terabyte) => 8 << 40,
        Ok(Unit::Unknown) | Err(_) => 0,
    };

    memory.value.saturating_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::proto::Cpu;

    fn laptop(price: f64, cores: u32, ghz: f64, ram_gb: u64) -> Laptop {
        Laptop {
            brand: "Lenovo".into(),
            name: "Thinkpad X1".into(),
            cpu: Some(Cpu {
                brand: "Intel".into(),
                name: "Core i7".into(),
                number_cores: cores,
                number_threads: cores * 2,
                min_ghz: ghz,
                max_ghz: ghz + 1.5,
            }),
            ram: Some(Memory::new(ram_gb, Unit::Gigabyte)),
            price_usd: price,
            release_year: 2023,
            ..Default::default()
        }
    }

    fn reference_filter() -> Filter {
        Filter {
            max_price_usd: 3000.0,
            min_cpu_cores: 4,
            min_cpu_ghz: 2.5,
            min_ram: Some(Memory::new(8, Unit::Gigabyte)),
        }
    }

    async fn collect(store: &InMemoryLaptopStore, filter: &Filter) -> Vec<Laptop> {
        let mut found = Vec::new();
        store
            .search(filter, |laptop| {
                found.push(laptop);
                async { Ok::<_, Infallible>(()) }
            })
            .await
            .unwrap();
        found
    }

    #[tokio::test]
    async fn save_then_find_returns_independent_copy() {
        let store = InMemoryLaptopStore::new();
        let original = laptop(2500.0, 4, 2.5, 8);
        let id = store.save(&original).await.unwrap();

        let mut found = store.find(&id).await.unwrap();
        let mut expected = original.clone();
        expected.id = id.clone();
        assert_eq!(found, expected);

        found.brand = "Mutated".into();
        found.cpu.as_mut().unwrap().number_cores = 64;
        let again = store.find(&id).await.unwrap();
        assert_eq!(again, expected);
    }

    #[tokio::test]
    async fn caller_mutation_after_save_does_not_leak_in() {
        let store = InMemoryLaptopStore::new();
        let mut original = laptop(2500.0, 4, 2.5, 8);
        original.id = Uuid::new_v4().to_string();
        store.save(&original).await.unwrap();

        original.price_usd = 1.0;
        let stored = store.find(&original.id).await.unwrap();
        assert_eq!(stored.price_usd, 2500.0);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_and_first_is_kept() {
        let store = InMemoryLaptopStore::new();
        let id = Uuid::new_v4().to_string();

        let mut first = laptop(1000.0, 4, 2.5, 8);
        first.id = id.clone();
        let mut second = laptop(2000.0, 8, 3.0, 16);
        second.id = id.clone();

        store.save(&first).await.unwrap();
        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        assert_eq!(store.find(&id).await.unwrap(), first);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn malformed_id_is_rejected() {
        let store = InMemoryLaptopStore::new();
        let mut bad = laptop(1000.0, 4, 2.5, 8);
        bad.id = "not-a-uuid".into();

        let err = store.save(&bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn find_unknown_id_is_none() {
        let store = InMemoryLaptopStore::new();
        assert!(store.find("missing").await.is_none());
    }

    #[tokio::test]
    async fn search_applies_every_predicate() {
        let store = InMemoryLaptopStore::new();
        let matching = store.save(&laptop(2500.0, 4, 2.5, 8)).await.unwrap();
        store.save(&laptop(3500.0, 4, 2.5, 8)).await.unwrap();
        store.save(&laptop(2500.0, 2, 2.5, 8)).await.unwrap();
        store.save(&laptop(2500.0, 4, 2.0, 8)).await.unwrap();
        store.save(&laptop(2500.0, 4, 2.5, 4)).await.unwrap();

        let found = collect(&store, &reference_filter()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, matching);
    }

    #[tokio::test]
    async fn raising_min_ram_excludes_laptop() {
        let store = InMemoryLaptopStore::new();
        store.save(&laptop(2500.0, 4, 2.5, 8)).await.unwrap();

        let mut filter = reference_filter();
        filter.min_ram = Some(Memory::new(16, Unit::Gigabyte));
        assert!(collect(&store, &filter).await.is_empty());
    }

    #[tokio::test]
    async fn search_stops_at_first_callback_error() {
        let store = InMemoryLaptopStore::new();
        for _ in 0..5 {
            store.save(&laptop(1000.0, 8, 3.0, 16)).await.unwrap();
        }

        let mut calls = 0;
        let result = store
            .search(&reference_filter(), |_| {
                calls += 1;
                async { Err::<(), _>("send failed") }
            })
            .await;

        assert_eq!(result, Err("send failed"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn memory_normalization() {
        assert_eq!(to_bit(None), 0);
        assert_eq!(to_bit(Some(&Memory::new(3, Unit::Bit))), 3);
        assert_eq!(to_bit(Some(&Memory::new(1, Unit::Byte))), 8);
        assert_eq!(to_bit(Some(&Memory::new(1, Unit::Kilobyte))), 8 * 1024);
        assert_eq!(
            to_bit(Some(&Memory::new(2, Unit::Gigabyte))),
            2 * 8 * 1024 * 1024 * 1024
        );
        assert_eq!(
            to_bit(Some(&Memory::new(8192, Unit::Megabyte))),
            to_bit(Some(&Memory::new(8, Unit::Gigabyte)))
        );
        assert_eq!(
            to_bit(Some(&Memory::new(1, Unit::Terabyte))),
            8 * 1024u64.pow(4)
        );
        assert_eq!(to_bit(Some(&Memory::new(5, Unit::Unknown))), 0);
    }

    #[test]
    fn laptop_without_cpu_or_ram_only_matches_zero_minimums() {
        let bare = Laptop {
            price_usd: 10.0,
            ..Default::default()
        };
        assert!(!is_qualified(&reference_filter(), &bare));
        assert!(is_qualified(
            &Filter {
                max_price_usd: 10.0,
                ..Default::default()
            },
            &bare
        ));
    }
}
