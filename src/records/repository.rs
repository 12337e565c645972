use std::marker::PhantomData;
use std::sync::Arc;
use serde::Serialize;
use serde_json::Value;
use crate::core::{DataApi, DataError};
use super::{Filter, Record};

/// Typed view of one record kind on top of a [`DataApi`].
pub struct Repository<T> {
    api: Arc<dyn DataApi>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Repository<T> {
    pub fn new(api: Arc<dyn DataApi>) -> Self {
        Self {
            api,
            _record: PhantomData,
        }
    }

    pub async fn create<I: Serialize>(&self, input: &I) -> Result<T, DataError> {
        let value = self.api.create(T::KIND, encode::<T, _>(input)?).await?;
        decode::<T>(value)
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, DataError> {
        self.api.get(T::KIND, id).await?.map(decode::<T>).transpose()
    }

    pub async fn list(&self, filter: &Filter) -> Result<Vec<T>, DataError> {
        self.api
            .list(T::KIND, filter)
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    pub async fn update<P: Serialize>(&self, id: &str, patch: &P) -> Result<T, DataError> {
        let value = self.api.update(T::KIND, id, encode::<T, _>(patch)?).await?;
        decode::<T>(value)
    }

    pub async fn delete(&self, id: &str) -> Result<(), DataError> {
        self.api.delete(T::KIND, id).await
    }
}

fn encode<T: Record, I: Serialize>(input: &I) -> Result<Value, DataError> {
    serde_json::to_value(input).map_err(|source| DataError::Decode { kind: T::KIND, source })
}

fn decode<T: Record>(value: Value) -> Result<T, DataError> {
    serde_json::from_value(value).map_err(|source| DataError::Decode { kind: T::KIND, source })
}
