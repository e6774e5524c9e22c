// 密码摘要: hex_md5(hex_md5(password) + hex_md5(randnumber.toLowerCase()))
use log::warn;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("摘要计算失败: {0}")]
pub struct HashError(pub String);

/// 摘要原语, 输出小写十六进制
pub trait DigestPrimitive {
    fn hex_digest(&self, input: &str) -> Result<String, HashError>;
}

/// 教务系统前端使用的 MD5
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Digest;

impl DigestPrimitive for Md5Digest {
    fn hex_digest(&self, input: &str) -> Result<String, HashError> {
        Ok(format!("{:x}", md5::compute(input.as_bytes())))
    }
}

/// 两段式密码摘要
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher<D = Md5Digest> {
    digest: D
}

impl CredentialHasher<Md5Digest> {
    pub fn new() -> Self {
        Self::with_digest(Md5Digest)
    }
}

impl<D: DigestPrimitive> CredentialHasher<D> {
    pub fn with_digest(digest: D) -> Self {
        Self { digest }
    }

    /// 计算要提交的 password 字段
    ///
    /// 密码原样参与摘要, randnumber 先转小写. randnumber 为空时拼接的是空串,
    /// 而不是空串的摘要, 教务系统就是这么算的.
    /// 摘要原语出错时退化为对密码做一次摘要, 并记录警告.
    pub fn hash(&self, password: &str, challenge: &str) -> String {
        match self.two_stage(password, challenge) {
            Ok(hashed) => hashed,
            Err(err) => {
                warn!("密码两段式摘要失败, 改用单次摘要: {}", err);
                self.single_stage(password)
            }
        }
    }

    fn two_stage(&self, password: &str, challenge: &str) -> Result<String, HashError> {
        let password_digest = self.digest.hex_digest(password)?;
        let challenge_digest = if challenge.is_empty() {
            String::new()
        } else {
            self.digest.hex_digest(&challenge.to_lowercase())?
        };

        self.digest.hex_digest(&format!("{}{}", password_digest, challenge_digest))
    }

    // 兜底时连摘要都失败, 只能交给 MD5 直接算
    fn single_stage(&self, password: &str) -> String {
        self.digest
            .hex_digest(password)
            .unwrap_or_else(|_| format!("{:x}", md5::compute(password.as_bytes())))
    }
}

/// 使用 MD5 计算登录密码
pub fn hash_password(password: &str, challenge: &str) -> String {
    CredentialHasher::new().hash(password, challenge)
}
