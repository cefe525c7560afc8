use crate::config::{StoreConfig, StoreCredentials};
use crate::error::ProvisionError;
use crate::params::JoinParameters;
use crate::store::{decode, object_key, ParameterStore};
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::{
	config::{self, retry::RetryConfig, Credentials, Region},
	primitives::ByteStream,
	types::ObjectCannedAcl,
	Client,
};
use secrecy::ExposeSecret;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

const CREDENTIALS_PROVIDER: &str = "kube-provision";

/// S3-backed parameter store.
///
/// Calls block on a private current-thread runtime. Each call is attempted
/// once; failures are returned to the caller without retry.
pub struct S3Store {
	client: Client,
	bucket: String,
	runtime: Runtime,
}

fn transport<E>(op: &'static str, key: &str, source: E) -> ProvisionError
where
	E: std::error::Error + Send + Sync + 'static,
{
	ProvisionError::Transport {
		op,
		key: key.to_owned(),
		source: Box::new(source),
	}
}

fn static_credentials(creds: &StoreCredentials) -> Credentials {
	Credentials::new(
		creds.access_key_id.clone(),
		creds.secret_access_key.expose_secret().clone(),
		creds
			.session_token
			.as_ref()
			.map(|token| token.expose_secret().clone()),
		None,
		CREDENTIALS_PROVIDER,
	)
}

/// Client settings layered over the shared SDK config: one attempt per call,
/// path-style addressing for custom endpoints.
fn client_config(sdk_config: &SdkConfig, path_style: bool) -> config::Config {
	config::Builder::from(sdk_config)
		.retry_config(RetryConfig::standard().with_max_attempts(1))
		.force_path_style(path_style)
		.build()
}

impl S3Store {
	pub fn new(store: &StoreConfig) -> Result<Self, ProvisionError> {
		let StoreConfig::S3 {
			bucket,
			region,
			endpoint_url,
			credentials,
		} = store
		else {
			return Err(ProvisionError::Config("S3 store requires an S3 configuration".to_owned()));
		};
		let runtime = Builder::new_current_thread().enable_all().build()?;
		let mut loader = aws_config::defaults(BehaviorVersion::latest());
		if let Some(region) = region {
			loader = loader.region(Region::new(region.clone()));
		}
		if let Some(endpoint) = endpoint_url {
			loader = loader.endpoint_url(endpoint);
		}
		if let Some(creds) = credentials {
			loader = loader.credentials_provider(static_credentials(creds));
		}
		let sdk_config = runtime.block_on(loader.load());
		let client = Client::from_conf(client_config(&sdk_config, endpoint_url.is_some()));
		debug!("S3 parameter store ready for bucket {bucket}.");
		Ok(S3Store {
			client,
			bucket: bucket.clone(),
			runtime,
		})
	}

	/// Wraps an already configured client.
	pub fn with_client(client: Client, bucket: &str) -> Result<Self, ProvisionError> {
		let runtime = Builder::new_current_thread().enable_all().build()?;
		Ok(S3Store {
			client,
			bucket: bucket.to_owned(),
			runtime,
		})
	}
}

impl ParameterStore for S3Store {
	fn put(&self, cluster_id: &str, params: &JoinParameters) -> Result<(), ProvisionError> {
		let key = object_key(cluster_id)?;
		params.validate()?;
		let body = params.to_json()?;
		let request = self
			.client
			.put_object()
			.bucket(&self.bucket)
			.key(&key)
			.acl(ObjectCannedAcl::Private)
			.content_type("application/json")
			.body(ByteStream::from(body.into_bytes()))
			.send();
		self.runtime
			.block_on(request)
			.map_err(|err| transport("put", &key, err))?;
		info!("Stored join parameters at s3://{}/{key}.", self.bucket);
		Ok(())
	}

	fn get(&self, cluster_id: &str) -> Result<JoinParameters, ProvisionError> {
		let key = object_key(cluster_id)?;
		let request = self.client.get_object().bucket(&self.bucket).key(&key).send();
		let response = match self.runtime.block_on(request) {
			Ok(response) => response,
			Err(err) => {
				let missing = err
					.as_service_error()
					.is_some_and(|service_err| service_err.is_no_such_key())
					|| err
						.raw_response()
						.is_some_and(|raw| raw.status().as_u16() == 404);
				if missing {
					return Err(ProvisionError::NotFound { key });
				}
				return Err(transport("get", &key, err));
			}
		};
		let body = self
			.runtime
			.block_on(response.body.collect())
			.map_err(|err| transport("get", &key, err))?
			.into_bytes();
		info!("Fetched join parameters from s3://{}/{key}.", self.bucket);
		decode(&key, &body)
	}
}
