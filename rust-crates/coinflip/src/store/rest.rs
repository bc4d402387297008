use crate::{
    backend::{
        BackendConfig,
        ensure_success,
        http_client,
    },
    record::{
        FLIP_HISTORY_TABLE,
        FlipRecord,
        NewFlipRecord,
    },
    session::AuthedUser,
    store::FlipStore,
};
use anyhow::{
    Context,
    anyhow,
};
use url::Url;

/// Flip store backed by the hosted database's REST interface. Row visibility
/// is enforced server side from the caller's bearer token.
#[derive(Clone)]
pub struct RestFlipStore {
    backend: BackendConfig,
    http: reqwest::Client,
}

impl RestFlipStore {
    pub fn new(backend: BackendConfig) -> anyhow::Result<Self> {
        Ok(Self {
            backend,
            http: http_client()?,
        })
    }

    fn table_url(&self) -> anyhow::Result<Url> {
        self.backend
            .endpoint(&format!("rest/v1/{FLIP_HISTORY_TABLE}"))
    }
}

impl FlipStore for RestFlipStore {
    async fn insert(
        &self,
        user: &AuthedUser,
        record: NewFlipRecord,
    ) -> anyhow::Result<FlipRecord> {
        let request = self
            .http
            .post(self.table_url()?)
            .header("Prefer", "return=representation")
            .json(&record);
        let res = self
            .backend
            .authorize(request, &user.access_token)
            .send()
            .await
            .context("flip insert request failed")?;
        let mut rows: Vec<FlipRecord> = ensure_success(res, "inserting a flip")
            .await?
            .json()
            .await
            .context("invalid flip insert payload")?;
        rows.pop()
            .ok_or_else(|| anyhow!("backend returned no row for inserted flip"))
    }

    async fn list(&self, user: &AuthedUser) -> anyhow::Result<Vec<FlipRecord>> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        let request = self.http.get(url);
        let res = self
            .backend
            .authorize(request, &user.access_token)
            .send()
            .await
            .context("flip history request failed")?;
        ensure_success(res, "loading flip history")
            .await?
            .json()
            .await
            .context("invalid flip history payload")
    }

    async fn delete_for_user(&self, user: &AuthedUser) -> anyhow::Result<()> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{}", user.id));
        let request = self.http.delete(url);
        let res = self
            .backend
            .authorize(request, &user.access_token)
            .send()
            .await
            .context("flip history delete request failed")?;
        ensure_success(res, "clearing flip history").await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn table_url__points_at_flip_history() {
        let backend = BackendConfig::new("https://example.supabase.co", "key").unwrap();
        let store = RestFlipStore::new(backend).unwrap();

        let url = store.table_url().unwrap();

        assert_eq!(url.as_str(), "https://example.supabase.co/rest/v1/flip_history");
    }

    #[test]
    fn flip_record__decodes_backend_row() {
        let row = r#"{
            "id": "5f1c",
            "user_id": "u1",
            "option_1": "Pizza",
            "option_2": "Tacos",
            "heads_option": "Pizza",
            "tails_option": "Tacos",
            "result": "tails",
            "winner": "Tacos",
            "created_at": "2025-03-01T12:00:00.123456+00:00"
        }"#;

        let record: FlipRecord = serde_json::from_str(row).unwrap();

        assert_eq!(record.winner, "Tacos");
        assert_eq!(record.result, crate::record::Side::Tails);
    }
}
