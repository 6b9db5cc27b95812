//! In-memory Star Wars data set

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Episode {
    NewHope,
    Empire,
    Jedi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LengthUnit {
    #[default]
    Meter,
    Foot,
}

impl LengthUnit {
    /// Convert a length given in meters to this unit
    pub fn from_meters(self, meters: f64) -> f64 {
        match self {
            LengthUnit::Meter => meters,
            LengthUnit::Foot => meters * 3.28084,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Human {
    pub id: String,
    pub name: String,
    pub friend_ids: Vec<String>,
    pub appears_in: Vec<Episode>,
    /// Height in meters
    pub height: f64,
    pub mass: Option<f64>,
    pub starship_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Droid {
    pub id: String,
    pub name: String,
    pub friend_ids: Vec<String>,
    pub appears_in: Vec<Episode>,
    pub primary_function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Starship {
    pub id: String,
    pub name: String,
    /// Length in meters
    pub length: f64,
    pub history: Vec<Vec<i32>>,
}

/// Any object of the data set, tagged with its GraphQL type name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "__typename")]
pub enum Node {
    Human(Human),
    Droid(Droid),
    Starship(Starship),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Human(h) => &h.id,
            Node::Droid(d) => &d.id,
            Node::Starship(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Human(h) => &h.name,
            Node::Droid(d) => &d.name,
            Node::Starship(s) => &s.name,
        }
    }

    /// JSON form handed to the executor
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub stars: i32,
    pub commentary: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

/// Argument of `createReview`
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub stars: i32,
    pub commentary: Option<String>,
    pub time: Option<DateTime<Utc>>,
}

/// Read-mostly store behind the bundled schema
///
/// Characters and starships are fixed; reviews are appended by the
/// `createReview` mutation.
pub struct StarWarsStore {
    humans: IndexMap<String, Human>,
    droids: IndexMap<String, Droid>,
    starships: IndexMap<String, Starship>,
    reviews: RwLock<HashMap<Episode, Vec<Review>>>,
}

impl StarWarsStore {
    pub fn new() -> Self {
        use Episode::*;

        let humans = [
            Human {
                id: "1000".to_string(),
                name: "Luke Skywalker".to_string(),
                friend_ids: ids(&["1002", "1003", "2000", "2001"]),
                appears_in: vec![NewHope, Empire, Jedi],
                height: 1.72,
                mass: Some(77.0),
                starship_ids: ids(&["3001", "3003"]),
            },
            Human {
                id: "1001".to_string(),
                name: "Darth Vader".to_string(),
                friend_ids: ids(&["1004"]),
                appears_in: vec![NewHope, Empire, Jedi],
                height: 2.02,
                mass: Some(136.0),
                starship_ids: ids(&["3002"]),
            },
            Human {
                id: "1002".to_string(),
                name: "Han Solo".to_string(),
                friend_ids: ids(&["1000", "1003", "2001"]),
                appears_in: vec![NewHope, Empire, Jedi],
                height: 1.8,
                mass: Some(80.0),
                starship_ids: ids(&["3000", "3003"]),
            },
            Human {
                id: "1003".to_string(),
                name: "Leia Organa".to_string(),
                friend_ids: ids(&["1000", "1002", "2000", "2001"]),
                appears_in: vec![NewHope, Empire, Jedi],
                height: 1.5,
                mass: Some(49.0),
                starship_ids: Vec::new(),
            },
            Human {
                id: "1004".to_string(),
                name: "Wilhuff Tarkin".to_string(),
                friend_ids: ids(&["1001"]),
                appears_in: vec![NewHope],
                height: 1.8,
                mass: None,
                starship_ids: Vec::new(),
            },
        ];

        let droids = [
            Droid {
                id: "2000".to_string(),
                name: "C-3PO".to_string(),
                friend_ids: ids(&["1000", "1002", "1003", "2001"]),
                appears_in: vec![NewHope, Empire, Jedi],
                primary_function: "Protocol".to_string(),
            },
            Droid {
                id: "2001".to_string(),
                name: "R2-D2".to_string(),
                friend_ids: ids(&["1000", "1002", "1003"]),
                appears_in: vec![NewHope, Empire, Jedi],
                primary_function: "Astromech".to_string(),
            },
        ];

        let starships = [
            Starship {
                id: "3000".to_string(),
                name: "Millennium Falcon".to_string(),
                length: 34.37,
                history: vec![vec![1, 2], vec![4, 5], vec![1, 2], vec![3, 2]],
            },
            Starship {
                id: "3001".to_string(),
                name: "X-Wing".to_string(),
                length: 12.5,
                history: vec![vec![6, 4], vec![3, 2], vec![2, 3], vec![5, 1]],
            },
            Starship {
                id: "3002".to_string(),
                name: "TIE Advanced x1".to_string(),
                length: 9.2,
                history: vec![vec![3, 2], vec![7, 2], vec![6, 4], vec![3, 2]],
            },
            Starship {
                id: "3003".to_string(),
                name: "Imperial shuttle".to_string(),
                length: 20.0,
                history: vec![vec![1, 7], vec![3, 3], vec![5, 2], vec![3, 4]],
            },
        ];

        Self {
            humans: humans.into_iter().map(|h| (h.id.clone(), h)).collect(),
            droids: droids.into_iter().map(|d| (d.id.clone(), d)).collect(),
            starships: starships.into_iter().map(|s| (s.id.clone(), s)).collect(),
            reviews: RwLock::new(HashMap::new()),
        }
    }

    pub fn human(&self, id: &str) -> Option<&Human> {
        self.humans.get(id)
    }

    pub fn droid(&self, id: &str) -> Option<&Droid> {
        self.droids.get(id)
    }

    pub fn starship(&self, id: &str) -> Option<&Starship> {
        self.starships.get(id)
    }

    /// Human or droid with the given ID
    pub fn character(&self, id: &str) -> Option<Node> {
        self.human(id)
            .cloned()
            .map(Node::Human)
            .or_else(|| self.droid(id).cloned().map(Node::Droid))
    }

    /// The hero of an episode: Luke for EMPIRE, R2-D2 otherwise
    pub fn hero(&self, episode: Option<Episode>) -> Option<Node> {
        match episode {
            Some(Episode::Empire) => self.character("1000"),
            _ => self.character("2001"),
        }
    }

    /// Humans, droids and starships whose name contains `text`
    pub fn search(&self, text: &str) -> Vec<Node> {
        let humans = self.humans.values().cloned().map(Node::Human);
        let droids = self.droids.values().cloned().map(Node::Droid);
        let starships = self.starships.values().cloned().map(Node::Starship);

        humans
            .chain(droids)
            .chain(starships)
            .filter(|node| node.name().contains(text))
            .collect()
    }

    /// Characters for each ID, skipping unknown ones
    pub fn characters(&self, ids: &[String]) -> Vec<Node> {
        ids.iter().filter_map(|id| self.character(id)).collect()
    }

    /// Reviews of an episode posted after `since`, oldest first
    pub fn reviews(&self, episode: Episode, since: Option<DateTime<Utc>>) -> Result<Vec<Review>> {
        let reviews = self
            .reviews
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(reviews
            .get(&episode)
            .into_iter()
            .flatten()
            .filter(|review| since.is_none_or(|since| review.time.is_some_and(|t| t > since)))
            .cloned()
            .collect())
    }

    /// Append a review, stamping it with the current time unless one is given
    pub fn add_review(&self, episode: Episode, input: ReviewInput) -> Result<Review> {
        let review = Review {
            stars: input.stars,
            commentary: input.commentary,
            time: Some(input.time.unwrap_or_else(Utc::now)),
        };

        let mut reviews = self
            .reviews
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        reviews.entry(episode).or_default().push(review.clone());

        tracing::debug!(episode = ?episode, stars = review.stars, "review added");
        Ok(review)
    }
}

impl Default for StarWarsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
