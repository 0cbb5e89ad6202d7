use std::path::Path;

/// One puzzle from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleRecord {
    pub id: String,
    pub fen: String,
    /// Full scripted line in coordinate notation, opponent move first.
    pub moves: Vec<String>,
    pub mate_type: String,
    pub level: u32,
}

/// A contiguous run of puzzles sharing level and mate type, for the
/// roadmap view.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadmapStage {
    pub level: u32,
    pub mate_type: String,
    /// Index of the stage's first puzzle in the catalog order.
    pub start_index: usize,
    pub count: usize,
}

/// Read and parse the puzzle catalog. A missing or unreadable file is
/// an empty catalog, not an error.
pub fn load_puzzles(path: &Path) -> Vec<PuzzleRecord> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let puzzles = parse_puzzle_csv(&contents);
            tracing::info!("Loaded {} puzzles from {:?}", puzzles.len(), path);
            puzzles
        }
        Err(e) => {
            tracing::warn!("Puzzle catalog {:?} unavailable: {}", path, e);
            Vec::new()
        }
    }
}

/// Parse the CSV catalog. The first row is a header naming the columns
/// `PuzzleId`, `Fen`, `Moves`, `MateType`, `Level` in any order. Rows
/// without a FEN are skipped.
pub fn parse_puzzle_csv(input: &str) -> Vec<PuzzleRecord> {
    let mut lines = input.lines().filter(|l| !l.trim().is_empty());

    let header = match lines.next() {
        Some(header) => split_csv_line(header),
        None => return Vec::new(),
    };
    let col = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(id_col), Some(fen_col), Some(moves_col)) =
        (col("PuzzleId"), col("Fen"), col("Moves"))
    else {
        tracing::warn!("Puzzle catalog header missing required columns");
        return Vec::new();
    };
    let mate_col = col("MateType");
    let level_col = col("Level");

    let mut puzzles = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");

        let fen = field(fen_col);
        if fen.is_empty() {
            continue;
        }

        puzzles.push(PuzzleRecord {
            id: field(id_col).to_string(),
            fen: fen.to_string(),
            moves: field(moves_col)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            mate_type: mate_col.map(field).unwrap_or("").to_string(),
            level: level_col
                .map(field)
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        });
    }
    puzzles
}

/// Split one CSV line, honoring quoted fields and doubled quotes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Group the catalog into roadmap stages: consecutive puzzles with the
/// same level and mate type form one stage, in catalog order.
pub fn build_roadmap(puzzles: &[PuzzleRecord]) -> Vec<RoadmapStage> {
    let mut stages: Vec<RoadmapStage> = Vec::new();
    for (index, puzzle) in puzzles.iter().enumerate() {
        match stages.last_mut() {
            Some(stage) if stage.level == puzzle.level && stage.mate_type == puzzle.mate_type => {
                stage.count += 1;
            }
            _ => stages.push(RoadmapStage {
                level: puzzle.level,
                mate_type: puzzle.mate_type.clone(),
                start_index: index,
                count: 1,
            }),
        }
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
PuzzleId,Fen,Moves,MateType,Level
m1-001,6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1,d1d8,back-rank,1
m1-002,\"r1b1k2r,extra\",e2e4 e7e5 d1h5,scholar,1
m2-001,8/8/8/8/8/8/8/8 w - - 0 1,a1a2 b1b2,ladder,2
skipped,,a1a2,ladder,2
";

    #[test]
    fn test_parse_catalog() {
        let puzzles = parse_puzzle_csv(CATALOG);
        assert_eq!(puzzles.len(), 3);
        assert_eq!(puzzles[0].id, "m1-001");
        assert_eq!(puzzles[0].moves, vec!["d1d8"]);
        assert_eq!(puzzles[0].level, 1);
        // Quoted field keeps its embedded comma.
        assert_eq!(puzzles[1].fen, "r1b1k2r,extra");
        assert_eq!(puzzles[1].moves.len(), 3);
    }

    #[test]
    fn test_rows_without_fen_skipped() {
        let puzzles = parse_puzzle_csv(CATALOG);
        assert!(puzzles.iter().all(|p| p.id != "skipped"));
    }

    #[test]
    fn test_doubled_quotes() {
        let fields = split_csv_line("a,\"say \"\"hi\"\"\",c");
        assert_eq!(fields, vec!["a", "say \"hi\"", "c"]);
    }

    #[test]
    fn test_missing_header_columns() {
        assert!(parse_puzzle_csv("Nope,Fields\n1,2\n").is_empty());
        assert!(parse_puzzle_csv("").is_empty());
    }

    #[test]
    fn test_roadmap_groups_consecutive_runs() {
        let puzzles = parse_puzzle_csv(CATALOG);
        let roadmap = build_roadmap(&puzzles);
        assert_eq!(roadmap.len(), 3);
        assert_eq!(roadmap[0].mate_type, "back-rank");
        assert_eq!(roadmap[0].count, 1);
        assert_eq!(roadmap[2].level, 2);
        assert_eq!(roadmap[2].start_index, 2);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        assert!(load_puzzles(Path::new("/nonexistent/puzzles.csv")).is_empty());
    }
}
