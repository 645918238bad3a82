//! Fixed trigger phrases for the keyword tier.
//!
//! Keys are trope names (matched case-insensitively against catalog entries);
//! values are lowercase phrases that, when present in a description, indicate
//! the trope even if its name does not appear verbatim.

pub const TROPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("Enemies to Lovers", &["enemies to lovers", "enemies-to-lovers", "hated each other", "rivals turned lovers"]),
    ("Friends to Lovers", &["friends to lovers", "best friend", "childhood friend", "more than friends"]),
    ("Second Chance", &["second chance", "ex-boyfriend", "ex-girlfriend", "rekindle", "old flame"]),
    ("Fake Relationship", &["fake relationship", "fake dating", "pretend to date", "fake fiancé", "fake fiance"]),
    ("Marriage of Convenience", &["marriage of convenience", "arranged marriage", "marry for", "contract marriage"]),
    ("Forced Proximity", &["forced proximity", "snowed in", "stuck together", "trapped together", "one room"]),
    ("Only One Bed", &["only one bed", "one bed", "share a bed", "sharing a bed"]),
    ("Secret Baby", &["secret baby", "hidden child", "didn't know he had a", "secret child"]),
    ("Slow Burn", &["slow burn", "slow-burn"]),
    ("Grumpy Sunshine", &["grumpy", "sunshine"]),
    ("Forbidden Love", &["forbidden love", "forbidden romance", "star-crossed", "not allowed to be together"]),
    ("Love Triangle", &["love triangle", "torn between"]),
    ("Workplace Romance", &["workplace romance", "office romance", "coworker", "co-worker", "his boss", "her boss"]),
    ("Billionaire", &["billionaire", "tycoon", "mogul"]),
    ("Small Town", &["small town", "small-town", "hometown"]),
    ("Found Family", &["found family", "chosen family"]),
    ("Chosen One", &["chosen one", "prophecy", "destined to"]),
    ("Amnesia", &["amnesia", "lost her memory", "lost his memory", "can't remember"]),
    ("Mistaken Identity", &["mistaken identity", "mistaken for", "wrong person"]),
    ("Bodyguard", &["bodyguard", "protector", "protect her", "protect him"]),
    ("Single Parent", &["single dad", "single mom", "single father", "single mother", "single parent"]),
    ("Age Gap", &["age gap", "older man", "older woman", "years older"]),
    ("Brother's Best Friend", &["brother's best friend", "brothers best friend"]),
    ("Royalty", &["prince", "princess", "royal family", "the king", "the queen"]),
    ("Redemption Arc", &["redemption", "redeem himself", "redeem herself", "atone for"]),
    ("Time Travel", &["time travel", "traveled back in time", "travelled back in time"]),
];

/// Trigger phrases for a trope name, if the table knows it.
pub fn triggers_for(name: &str) -> Option<&'static [&'static str]> {
    TROPE_KEYWORDS
        .iter()
        .find(|(trope, _)| trope.eq_ignore_ascii_case(name.trim()))
        .map(|(_, phrases)| *phrases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert!(triggers_for("secret baby").unwrap().contains(&"secret baby"));
        assert!(triggers_for("Unknown Trope").is_none());
    }

    #[test]
    fn phrases_are_lowercase() {
        for (name, phrases) in TROPE_KEYWORDS {
            for phrase in *phrases {
                assert_eq!(*phrase, phrase.to_lowercase(), "{name}");
            }
        }
    }
}
