pub mod digit_span;
pub mod kohs;
pub mod pass_along;
pub mod puzzle;
pub mod trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameKind
{
    Kohs,
    DigitSpan,
    Puzzle,
    Trace,
    PassAlong,
}

pub struct GameDescriptor
{
    pub kind: GameKind,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn registry() -> Vec<GameDescriptor>
{
    vec![GameDescriptor {
        kind: GameKind::Kohs,
        name: "kohs",
        description: "Rebuild coloured block designs from a target card",
    },
    GameDescriptor {
        kind: GameKind::DigitSpan,
        name: "digit-span",
        description: "Recall digit sequences forward, then in reverse",
    },
    GameDescriptor {
        kind: GameKind::Puzzle,
        name: "puzzle",
        description: "Slide picture tiles back into place against the clock",
    },
    GameDescriptor {
        kind: GameKind::Trace,
        name: "trace",
        description: "Trace a shape free-hand and get scored on closeness",
    },
    GameDescriptor {
        kind: GameKind::PassAlong,
        name: "pass-along",
        description: "Rearrange red and blue blocks to match a design",
    }]
}

/// Looks a game up by its command name, ignoring case.
pub fn find(name: &str) -> Option<GameDescriptor>
{
    registry()
        .into_iter()
        .find(|game| game.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_find_by_name()
    {
        assert_eq!(find("kohs").map(|game| game.kind), Some(GameKind::Kohs));
        assert_eq!(find(" Pass-Along ").map(|game| game.kind), Some(GameKind::PassAlong));
        assert!(find("wordle").is_none());
    }

    #[test]
    fn test_registry_names_are_unique()
    {
        let games = registry();
        for game in &games {
            assert_eq!(games.iter().filter(|other| other.name == game.name).count(), 1);
        }
    }
}
