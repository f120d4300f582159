//! Authoring aid: prints the `hidden_connections:` YAML that maps every
//! ordering of the secret code fragments to the secret ending.
//!
//! Players who collect all the fragments can dial them in any order, so
//! the hub scene needs one hidden connection per permutation.
//!
//! ```bash
//! cargo run -p payphone --bin codes -- 451 7464 9453 3255
//! ```

fn main() {
    let fragments: Vec<String> = {
        let args: Vec<String> = std::env::args().skip(1).collect();
        if args.is_empty() {
            ["451", "7464", "9453", "3255"]
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            args
        }
    };

    println!("hidden_connections:");
    for perm in permutations(&fragments) {
        println!("  \"{}\": \"secret_ending\"", perm.concat());
    }
    println!("  \"default\": \"hub\"");
}

fn permutations(items: &[String]) -> Vec<Vec<String>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, item.clone());
            out.push(tail);
        }
    }
    out
}
