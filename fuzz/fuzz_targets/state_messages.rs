//! Arbitrary bytes on a state channel's endpoints must be dropped, never
//! delivered half-decoded.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use plexus_core::{identify, EndpointKey, Fingerprint, Role};
use plexus_runtime::{Context, RuntimeConfig};

fuzz_target!(|data: &[u8]| {
    let config = RuntimeConfig::default();
    let namespace = config.namespace();
    let a = Context::new(namespace.clone(), "a", &config);
    let b = Context::new(namespace.clone(), "b", &config);

    let key = Fingerprint::key("fuzzed");
    let sa = a.declare_state::<(u32, String)>(key.clone()).unwrap();
    let sb = b.declare_state::<(u32, String)>(key.clone()).unwrap();
    sa.set((1, "one".to_string())).unwrap();

    let id = identify(&key);
    let (split, rest) = data.split_at(data.len() / 2);
    for (role, payload) in [(Role::Changed, split), (Role::Announce, rest)] {
        let (endpoint, created) = namespace.resolve(EndpointKey::new(id, role));
        assert!(!created);
        endpoint.fire(Bytes::copy_from_slice(payload));
    }

    // Both caches hold either the seeded value or a fully decoded one
    let value = sa.get().unwrap();
    assert_eq!(sb.get(), Some(value));
});
